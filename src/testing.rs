//! in-process relays for tests

use crate::{
    envelopes::{parse_message, Envelope},
    Event, EventTemplate, Kind, SecretKey, Tags, Timestamp,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use url::Url;

#[derive(Debug, Clone, Copy)]
pub(crate) enum OnPublish {
    Accept,
    Reject(&'static str),
    /// never answer with OK
    Ignore,
}

struct State {
    events: Vec<Event>,
    on_publish: OnPublish,
    silent: bool,
    received: Mutex<Vec<Event>>,
}

pub(crate) struct MockRelay {
    pub url: Url,
    state: Arc<State>,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<()>,
}

impl MockRelay {
    /// answers REQs with the matching stored events followed by EOSE
    pub async fn start(events: Vec<Event>, on_publish: OnPublish) -> Self {
        Self::spawn(events, on_publish, false).await
    }

    /// accepts the websocket and then never says anything
    pub async fn silent() -> Self {
        Self::spawn(vec![], OnPublish::Ignore, true).await
    }

    async fn spawn(events: Vec<Event>, on_publish: OnPublish, silent: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}", listener.local_addr().unwrap())).unwrap();
        let state = Arc::new(State {
            events,
            on_publish,
            silent,
            received: Mutex::new(Vec::new()),
        });
        let (shutdown, shutdown_rx) = watch::channel(false);

        let server_state = state.clone();
        let server = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, server_state.clone(), shutdown_rx.clone()));
            }
        });

        Self {
            url,
            state,
            shutdown,
            server,
        }
    }

    pub async fn received(&self) -> Vec<Event> {
        self.state.received.lock().await.clone()
    }

    /// close every open connection and stop accepting new ones
    pub async fn shutdown(&self) {
        self.server.abort();
        let _ = self.shutdown.send(true);
    }
}

impl Drop for MockRelay {
    fn drop(&mut self) {
        self.server.abort();
        let _ = self.shutdown.send(true);
    }
}

async fn serve(stream: TcpStream, state: Arc<State>, mut shutdown: watch::Receiver<bool>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    loop {
        let text = tokio::select! {
            _ = shutdown.changed() => {
                let _ = ws.send(Message::Close(None)).await;
                return;
            }
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(_)) => continue,
                _ => return,
            },
        };

        if state.silent {
            continue;
        }

        match parse_message(text.as_str()) {
            Ok(Envelope::Req {
                subscription_id,
                filters,
            }) => {
                for filter in &filters {
                    // newest first, like real relays do before applying the limit
                    let mut matching: Vec<&Event> = state
                        .events
                        .iter()
                        .filter(|event| filter.matches(event))
                        .collect();
                    matching.sort_by_key(|event| std::cmp::Reverse(event.created_at));
                    matching.truncate(filter.limit.unwrap_or(usize::MAX));
                    for event in matching {
                        let msg = Envelope::InEvent {
                            subscription_id: subscription_id.clone(),
                            event: event.clone(),
                        };
                        let _ = ws.send(Message::text(msg.to_json())).await;
                    }
                }
                let _ = ws
                    .send(Message::text(Envelope::Eose { subscription_id }.to_json()))
                    .await;
            }
            Ok(Envelope::OutEvent { event }) => {
                let event_id = event.id;
                state.received.lock().await.push(event);
                let (ok, reason) = match state.on_publish {
                    OnPublish::Accept => (true, ""),
                    OnPublish::Reject(reason) => (false, reason),
                    OnPublish::Ignore => continue,
                };
                let msg = Envelope::Ok {
                    event_id,
                    ok,
                    reason: reason.to_string(),
                };
                let _ = ws.send(Message::text(msg.to_json())).await;
            }
            _ => {}
        }
    }
}

/// a local address nobody listens on
pub(crate) async fn refused_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("ws://{}", addr)).unwrap()
}

pub(crate) fn event_with(sk: &SecretKey, kind: Kind, created_at: u32, tags: Vec<Vec<&str>>) -> Event {
    EventTemplate {
        created_at: Timestamp(created_at),
        kind,
        tags: Tags(
            tags.into_iter()
                .map(|tag| tag.into_iter().map(|s| s.to_string()).collect())
                .collect(),
        ),
        content: format!("event at {}", created_at),
    }
    .finalize(sk)
}
