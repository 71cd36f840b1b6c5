use crate::{
    envelopes::{parse_message, Envelope},
    helpers::{
        extract_event_id, extract_key_from_sub_id, key_from_sub_id, sub_id_from_key,
        SubscriptionKey,
    },
    Event, Filter, ID,
};
use dashmap::{DashMap, DashSet};
use futures::{SinkExt, StreamExt};
use slotmap::{SecondaryMap, SlotMap};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{client::IntoClientRequest, Message},
};
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("ok=false, relay message: {0}")]
    NotOK(String),

    #[error("internal channel error, relay connection might have closed")]
    Channel,
}

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    #[error("relay connection error: {0}")]
    Websocket(String),
}

#[derive(Debug)]
pub(crate) struct SubSender {
    pub(crate) ocurrences_sender: mpsc::Sender<Occurrence>,
    pub(crate) filter: Filter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    RelayConnectionClosedByUs,
    RelayConnectionClosedByThem(Option<String>),
    RelayConnectionError(String),
    ClosedByThemWithReason(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::RelayConnectionClosedByUs => write!(f, "connection closed by us"),
            CloseReason::RelayConnectionClosedByThem(Some(msg)) => {
                write!(f, "connection closed by relay: {}", msg)
            }
            CloseReason::RelayConnectionClosedByThem(None) => write!(f, "connection closed by relay"),
            CloseReason::RelayConnectionError(err) => write!(f, "connection error: {}", err),
            CloseReason::ClosedByThemWithReason(reason) => write!(f, "CLOSED: {}", reason),
        }
    }
}

#[derive(Default, Clone)]
pub struct SubscriptionOptions {
    pub label: Option<String>,

    /// ids already delivered elsewhere, shared between relays of the same query
    pub(crate) skip_ids: Option<Arc<DashSet<ID>>>,
}

impl std::fmt::Debug for SubscriptionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionOptions")
            .field("label", &self.label)
            .field("skip_ids", &self.skip_ids.as_ref().map(|s| s.len()))
            .finish()
    }
}

#[derive(Debug)]
pub enum Occurrence {
    Event(Event),
    EOSE,
    Close(CloseReason),
}

type SubSenderMap = Arc<Mutex<SlotMap<SubscriptionKey, SubSender>>>;
type IdSkippersMap = Arc<Mutex<SecondaryMap<SubscriptionKey, Arc<DashSet<ID>>>>>;
type OkCallbacks = Arc<DashMap<ID, oneshot::Sender<Result<(), String>>>>;

/// a single websocket connection to a relay.
///
/// dropping it tears the connection down, [`Relay::close`] says goodbye first.
#[derive(Debug)]
pub struct Relay {
    pub url: Url,
    // by connection
    write_queue: mpsc::Sender<Message>,
    writer_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
    ping_task: JoinHandle<()>,

    // by subscription
    pub(crate) sub_sender_map: SubSenderMap,
    id_skippers_map: IdSkippersMap,

    // by publish
    ok_callbacks: OkCallbacks,
}

impl Relay {
    pub async fn connect(url: Url) -> Result<Self, ConnectError> {
        let (write_sender, mut write_receiver) = mpsc::channel::<Message>(8);

        let request = url
            .as_str()
            .into_client_request()
            .map_err(|err| ConnectError::InvalidUrl(err.to_string()))?;
        let (ws_stream, _) = connect_async_tls_with_config(request, None, false, None)
            .await
            .map_err(|err| ConnectError::Websocket(err.to_string()))?;

        log::debug!("[{}] connected", url);

        let (mut conn_write, mut conn_read) = ws_stream.split();

        // start write queue handler, pings and pongs also go through here
        let writer_url = url.clone();
        let writer_task = tokio::spawn(async move {
            while let Some(msg) = write_receiver.recv().await {
                let is_close = matches!(msg, Message::Close(_));
                if let Err(err) = conn_write.send(msg).await {
                    log::debug!("[{}] write failed: {}", writer_url, err);
                    break;
                }
                if is_close {
                    break;
                }
            }
        });

        // start ping handler
        let ping_queue = write_sender.clone();
        let ping_task = tokio::spawn(async move {
            let mut ping_interval = tokio::time::interval(Duration::from_secs(29));
            ping_interval.tick().await;
            loop {
                ping_interval.tick().await;
                if ping_queue.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        });

        let sub_sender_map: SubSenderMap = Arc::new(Mutex::new(SlotMap::with_capacity_and_key(8)));
        let id_skippers_map: IdSkippersMap = Arc::new(Mutex::new(SecondaryMap::with_capacity(8)));
        let ok_callbacks: OkCallbacks = Arc::new(DashMap::new());

        // start message reader
        let reader_queue = write_sender.clone();
        let reader_subs = sub_sender_map.clone();
        let reader_skippers = id_skippers_map.clone();
        let reader_callbacks = ok_callbacks.clone();
        let relay_url = url.clone();
        let reader_task = tokio::spawn(async move {
            let reason = loop {
                match conn_read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        handle_nostr_envelope(
                            text.as_str(),
                            &reader_subs,
                            &reader_skippers,
                            &reader_callbacks,
                            &relay_url,
                        )
                        .await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = reader_queue.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break CloseReason::RelayConnectionClosedByThem(
                            frame.map(|c| format!("close ({}) {}", c.code, c.reason)),
                        );
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => break CloseReason::RelayConnectionError(err.to_string()),
                    None => break CloseReason::RelayConnectionClosedByThem(None),
                }
            };

            log::debug!("[{}] reader stopped: {}", relay_url, reason);

            // nobody will answer pending publishes anymore
            reader_callbacks.clear();
            for (_, sub) in reader_subs.lock().await.drain() {
                let _ = sub
                    .ocurrences_sender
                    .send(Occurrence::Close(reason.clone()))
                    .await;
            }
        });

        Ok(Self {
            url,
            write_queue: write_sender,
            writer_task,
            reader_task,
            ping_task,
            sub_sender_map,
            id_skippers_map,
            ok_callbacks,
        })
    }

    /// send an event and wait for the relay's OK
    pub async fn publish(&self, event: Event) -> Result<(), PublishError> {
        let (tx, rx) = oneshot::channel();
        self.ok_callbacks.insert(event.id, tx);

        let msg = Envelope::OutEvent { event }.to_json();
        self.write_queue
            .send(Message::text(msg))
            .await
            .map_err(|_| PublishError::Channel)?;

        rx.await
            .map_err(|_| PublishError::Channel)
            .and_then(|r| r.map_err(PublishError::NotOK))
    }

    /// subscribe to events matching a filter
    pub async fn subscribe(
        &self,
        filter: Filter,
        opts: SubscriptionOptions,
    ) -> mpsc::Receiver<Occurrence> {
        let mut reqmsg = String::new();
        let mut closemsg = String::new();
        let (occurrences_sender, occurrences) = mpsc::channel::<Occurrence>(1);

        let key = self.sub_sender_map.lock().await.insert_with_key(|key| {
            let subscription_id = sub_id_from_key(&key, &opts.label);
            reqmsg = Envelope::Req {
                subscription_id: subscription_id.clone(),
                filters: vec![filter.clone()],
            }
            .to_json();
            closemsg = Envelope::Close { subscription_id }.to_json();

            SubSender {
                ocurrences_sender: occurrences_sender.clone(),
                filter,
            }
        });

        if let Some(skip_ids) = opts.skip_ids {
            self.id_skippers_map.lock().await.insert(key, skip_ids);
        }

        let write_queue = self.write_queue.clone();
        let sub_sender_map = self.sub_sender_map.clone();
        let id_skippers_map = self.id_skippers_map.clone();
        tokio::spawn(async move {
            // when the listener stops listening from this subscription we close it automatically
            occurrences_sender.closed().await;
            let was_live = sub_sender_map.lock().await.remove(key).is_some();
            id_skippers_map.lock().await.remove(key);
            if was_live {
                let _ = write_queue.send(Message::text(closemsg)).await;
            }
        });

        if let Err(err) = self.write_queue.send(Message::text(reqmsg)).await {
            log::warn!("[{}] failed to fire subscription: {}", self.url, err);
        }

        occurrences
    }

    /// send a close frame and give the writer a moment to flush it
    pub async fn close(mut self) {
        for (_, sub) in self.sub_sender_map.lock().await.drain() {
            let _ = sub
                .ocurrences_sender
                .try_send(Occurrence::Close(CloseReason::RelayConnectionClosedByUs));
        }
        if self.write_queue.send(Message::Close(None)).await.is_ok() {
            let _ = tokio::time::timeout(Duration::from_secs(1), &mut self.writer_task).await;
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.ping_task.abort();
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

impl std::fmt::Display for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<relay url={}>", self.url)
    }
}

async fn handle_nostr_envelope(
    message: &str,
    sub_sender_map: &SubSenderMap,
    id_skippers_map: &IdSkippersMap,
    ok_callbacks: &OkCallbacks,
    relay_url: &Url,
) {
    if let Some(sub_key) = extract_key_from_sub_id(message) {
        if let Some(skip_ids) = id_skippers_map.lock().await.get(sub_key) {
            if let Some(id) = extract_event_id(message) {
                if skip_ids.contains(&id) {
                    // another relay already delivered this one
                    return;
                }
            }
        }
    }

    match parse_message(message) {
        Ok(Envelope::InEvent {
            subscription_id,
            event,
        }) => {
            let key = key_from_sub_id(&subscription_id);
            let sender = match sub_sender_map.lock().await.get(key) {
                Some(sub) if sub.filter.matches(&event) => sub.ocurrences_sender.clone(),
                Some(_) => {
                    log::debug!(
                        "[{}] event {} doesn't match subscription {}",
                        relay_url,
                        event.id,
                        subscription_id
                    );
                    return;
                }
                None => return,
            };

            // only an authentic copy may claim its id
            if let Some(skip_ids) = id_skippers_map.lock().await.get(key) {
                if event.check_id() && event.verify_signature() {
                    if !skip_ids.insert(event.id) {
                        return;
                    }
                } else {
                    log::debug!("[{}] unverified event {}, not claiming its id", relay_url, event.id);
                }
            }
            let _ = sender.send(Occurrence::Event(event)).await;
        }
        Ok(Envelope::Eose { subscription_id }) => {
            let key = key_from_sub_id(&subscription_id);
            let sender = sub_sender_map
                .lock()
                .await
                .get(key)
                .map(|sub| sub.ocurrences_sender.clone());
            if let Some(sender) = sender {
                let _ = sender.send(Occurrence::EOSE).await;
            }
        }
        Ok(Envelope::Ok {
            event_id,
            ok,
            reason,
        }) => match ok_callbacks.remove(&event_id) {
            Some((_, sender)) => {
                let _ = sender.send(match ok {
                    true => Ok(()),
                    false => Err(reason),
                });
            }
            None => {
                log::info!(
                    "[{}] received OK for unknown event {}: {} - {}",
                    relay_url,
                    event_id,
                    ok,
                    reason
                );
            }
        },
        Ok(Envelope::Notice(notice)) => {
            log::info!("[{}] received notice: {}", relay_url, notice);
        }
        Ok(Envelope::Closed {
            subscription_id,
            reason,
        }) => {
            let key = key_from_sub_id(&subscription_id);
            let removed = sub_sender_map.lock().await.remove(key);
            if let Some(sub) = removed {
                let _ = sub
                    .ocurrences_sender
                    .send(Occurrence::Close(CloseReason::ClosedByThemWithReason(
                        reason,
                    )))
                    .await;
            }
        }
        Ok(Envelope::AuthChallenge { .. }) => {
            log::debug!("[{}] ignoring AUTH challenge", relay_url);
        }
        Ok(envelope) => {
            log::info!("[{}] unexpected message: {}", relay_url, envelope.label());
        }
        Err(err) => {
            log::info!("[{}] wrong message: {}", relay_url, err);
        }
    }
}
