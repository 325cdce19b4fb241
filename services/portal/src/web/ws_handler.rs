//! services/portal/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection:
//! the per-client application shell. It owns that client's auth gateway,
//! session controller and navigation router, and relays auth-state and page
//! changes to the browser.

use crate::{
    adapters::PgAuthGateway,
    web::{
        protocol::{ClientMessage, RegistrationView, ServerMessage},
        state::AppState,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use horoscope_core::domain::ProfileChanges;
use horoscope_core::gate;
use horoscope_core::router::{NavigationRouter, RouterEvent};
use horoscope_core::session::{NewRegistration, SessionController};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Hello Phase ---
    let resume_token = match read_hello(&mut receiver).await {
        Some(token) => token,
        None => {
            let _ = send(&mut sender, &ServerMessage::Error {
                message: "First message must be a hello.".to_string(),
            })
            .await;
            return;
        }
    };

    let gateway = Arc::new(PgAuthGateway::new(
        app_state.pool.clone(),
        app_state.config.session_ttl_days,
        resume_token,
    ));
    let controller = Arc::new(SessionController::new(
        gateway.clone(),
        app_state.profiles.clone(),
        app_state.config.session_timeouts(),
    ));

    // The event loop must be listening before the provider announces the
    // synthetic initial-session event (which the controller ignores).
    let events_task = Arc::clone(&controller).run();
    gateway.announce_initial_session().await;

    let mut auth_rx = controller.subscribe();
    let mut router = NavigationRouter::new();

    controller.bootstrap().await;
    push_auth_update(&controller, &gateway, &mut router, &mut sender).await;

    // --- 2. Main Loop ---
    loop {
        tokio::select! {
            changed = auth_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if !push_auth_update(&controller, &gateway, &mut router, &mut sender).await {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text_message(
                            text.to_string(),
                            &controller,
                            &mut router,
                            &mut sender,
                        )
                        .await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client disconnected.");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {e}");
                        break;
                    }
                }
            }
        }
    }

    // --- 3. Cleanup ---
    // Aborting the event task is the teardown guard: no late auth event can
    // touch the controller once the client is gone.
    events_task.abort();
    info!("WebSocket connection closed.");
}

/// Waits for the mandatory `Hello` and returns its resume token.
async fn read_hello(receiver: &mut SplitStream<WebSocket>) -> Option<Option<String>> {
    let text = match receiver.next().await {
        Some(Ok(Message::Text(text))) => text,
        _ => return None,
    };
    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(ClientMessage::Hello { session_token }) => Some(session_token),
        _ => {
            error!("First message was not a valid hello message.");
            None
        }
    }
}

/// Sends the current auth state and, when the auto-routing evaluation moved
/// the page, the new page. Returns `false` once the socket is gone.
async fn push_auth_update(
    controller: &Arc<SessionController>,
    gateway: &Arc<PgAuthGateway>,
    router: &mut NavigationRouter,
    sender: &mut SplitSink<WebSocket, Message>,
) -> bool {
    let state = controller.state();
    let seen_generation = router.generation();

    let session_token = if state.user.is_some() {
        gateway.session_token().await
    } else {
        None
    };
    if !send(sender, &ServerMessage::auth_state(&state, session_token)).await {
        return false;
    }

    let moved = router.apply(RouterEvent::AuthChanged {
        snapshot: state.snapshot(),
        seen_generation,
    });
    if let Some(page) = moved {
        return send(sender, &ServerMessage::Page {
            page,
            chrome: gate::chrome(page),
        })
        .await;
    }
    true
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: String,
    controller: &Arc<SessionController>,
    router: &mut NavigationRouter,
    sender: &mut SplitSink<WebSocket, Message>,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {e}");
            return;
        }
    };

    match client_msg {
        ClientMessage::Hello { .. } => {
            warn!("Received subsequent hello message, which is ignored.");
        }

        ClientMessage::Navigate { page } => {
            if let Some(page) = router.apply(RouterEvent::UserNavigated(page)) {
                let _ = send(sender, &ServerMessage::Page {
                    page,
                    chrome: gate::chrome(page),
                })
                .await;
            }
        }

        ClientMessage::SignIn {
            email,
            password,
            portal,
        } => match controller.sign_in(&email, &password, portal).await {
            Ok(profile) => {
                // Jump straight to the account's home; the profile load
                // already happened, so there is nothing to wait on.
                let home = gate::home_for(profile.role);
                if let Some(page) = router.apply(RouterEvent::UserNavigated(home)) {
                    let _ = send(sender, &ServerMessage::Page {
                        page,
                        chrome: gate::chrome(page),
                    })
                    .await;
                }
            }
            Err(e) => {
                let _ = send(sender, &ServerMessage::FlowError {
                    message: e.to_string(),
                })
                .await;
            }
        },

        ClientMessage::Register {
            email,
            password,
            full_name,
            gender,
            date_of_birth,
        } => {
            let registration = NewRegistration {
                email,
                password,
                full_name,
                gender,
                date_of_birth,
            };
            match controller.register(registration).await {
                Ok(outcome) => {
                    let _ = send(sender, &ServerMessage::Registered {
                        outcome: RegistrationView::from(outcome),
                    })
                    .await;
                }
                Err(e) => {
                    let _ = send(sender, &ServerMessage::FlowError {
                        message: e.to_string(),
                    })
                    .await;
                }
            }
        }

        ClientMessage::RegisterAdmin {
            email,
            password,
            full_name,
            gender,
        } => {
            let registration = NewRegistration {
                email,
                password,
                full_name,
                gender,
                date_of_birth: None,
            };
            match controller.register_admin(registration).await {
                Ok(outcome) => {
                    let _ = send(sender, &ServerMessage::Registered {
                        outcome: RegistrationView::from(outcome),
                    })
                    .await;
                }
                Err(e) => {
                    let _ = send(sender, &ServerMessage::FlowError {
                        message: e.to_string(),
                    })
                    .await;
                }
            }
        }

        ClientMessage::SignOut => {
            controller.sign_out().await;
        }

        ClientMessage::RefreshProfile => {
            controller.refresh_profile().await;
        }

        ClientMessage::SaveProfile {
            full_name,
            gender,
            date_of_birth,
        } => {
            let changes = ProfileChanges {
                full_name,
                gender,
                date_of_birth,
                // Recomputed by the controller from the edited date.
                zodiac_sign: None,
            };
            if let Err(e) = controller.save_profile(changes).await {
                let _ = send(sender, &ServerMessage::FlowError {
                    message: e.to_string(),
                })
                .await;
            }
        }

        ClientMessage::ChangePassword { new_password } => {
            match controller.change_password(&new_password).await {
                Ok(()) => {
                    let _ = send(sender, &ServerMessage::PasswordChanged).await;
                }
                Err(e) => {
                    let _ = send(sender, &ServerMessage::FlowError {
                        message: e.to_string(),
                    })
                    .await;
                }
            }
        }
    }
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {e}");
            return false;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}
