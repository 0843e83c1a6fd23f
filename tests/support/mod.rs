//! In-process stand-in for the gateway HTTP API. Notifications stay queued
//! until their receipt is deleted, like the real service.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub struct Gateway {
    pub state_instance: String,
    pub state_status: Option<u16>,
    pub contact: (u16, Value),
    pub contact_requests: Vec<Value>,
    pub queue: VecDeque<(u64, Value)>,
    pub next_receipt: u64,
    pub receive_calls: usize,
    pub receive_status: Option<u16>,
    /// Per-call outcomes consumed front first: `Some(code)` fails, `None`
    /// answers normally. Falls back to `receive_status` once empty.
    pub receive_script: VecDeque<Option<u16>>,
    pub receive_delay: Option<Duration>,
    pub in_flight: usize,
    pub max_in_flight: usize,
    pub avatars: HashMap<String, Vec<u8>>,
    pub deleted: Vec<String>,
    pub sent: Vec<Value>,
    pub send_status: Option<u16>,
}

impl Default for Gateway {
    fn default() -> Self {
        Self {
            state_instance: "authorized".into(),
            state_status: None,
            contact: (
                200,
                json!({
                    "chatId": "79123456789@c.us",
                    "name": "Ann",
                    "avatar": "https://pps.example/ann.jpg",
                    "contactName": "",
                    "isBusiness": false
                }),
            ),
            contact_requests: Vec::new(),
            queue: VecDeque::new(),
            next_receipt: 1,
            receive_calls: 0,
            receive_status: None,
            receive_script: VecDeque::new(),
            receive_delay: None,
            in_flight: 0,
            max_in_flight: 0,
            avatars: HashMap::new(),
            deleted: Vec::new(),
            sent: Vec::new(),
            send_status: None,
        }
    }
}

impl Gateway {
    /// Queues a notification body and returns its receipt id.
    pub fn enqueue(&mut self, body: Value) -> u64 {
        let receipt = self.next_receipt;
        self.next_receipt += 1;
        self.queue.push_back((receipt, body));
        receipt
    }
}

pub fn text_body(id: &str, sender: &str, text: &str) -> Value {
    json!({
        "typeWebhook": "incomingMessageReceived",
        "idMessage": id,
        "senderData": { "chatId": sender, "sender": sender, "senderName": "Ann" },
        "messageData": {
            "typeMessage": "textMessage",
            "textMessageData": { "textMessage": text }
        }
    })
}

type Shared = Arc<Mutex<Gateway>>;

pub struct FakeGateway {
    pub url: String,
    pub state: Shared,
    task: JoinHandle<()>,
}

impl FakeGateway {
    pub async fn start(gateway: Gateway) -> Self {
        let state: Shared = Arc::new(Mutex::new(gateway));
        let app = Router::new()
            .route("/{instance}/getStateInstance/{token}", get(state_instance))
            .route("/{instance}/getContactInfo/{token}", post(contact_info))
            .route("/{instance}/receiveNotification/{token}", get(receive))
            .route("/{instance}/deleteNotification/{token}/{receipt}", delete(delete_notification))
            .route("/{instance}/sendMessage/{token}", post(send_message))
            .route("/avatars/{name}", get(avatar))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake gateway");
        let addr = listener.local_addr().expect("local_addr");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: format!("http://{addr}"),
            state,
            task,
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Gateway) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Waits until `pred` holds, panicking after five seconds.
    pub async fn wait_until(&self, what: &str, pred: impl Fn(&Gateway) -> bool) {
        for _ in 0..250 {
            if pred(&self.state.lock().unwrap()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("fake gateway never reached: {what}");
    }
}

impl Drop for FakeGateway {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn state_instance(State(state): State<Shared>) -> Response {
    let gw = state.lock().unwrap();
    if let Some(code) = gw.state_status {
        return status(code).into_response();
    }
    Json(json!({ "stateInstance": gw.state_instance })).into_response()
}

async fn contact_info(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut gw = state.lock().unwrap();
    gw.contact_requests.push(body);
    let (code, value) = gw.contact.clone();
    (status(code), Json(value)).into_response()
}

async fn receive(State(state): State<Shared>) -> Response {
    let (response, delay) = {
        let mut gw = state.lock().unwrap();
        gw.receive_calls += 1;
        gw.in_flight += 1;
        gw.max_in_flight = gw.max_in_flight.max(gw.in_flight);
        let failure = match gw.receive_script.pop_front() {
            Some(scripted) => scripted,
            None => gw.receive_status,
        };
        let response = match (failure, gw.queue.front()) {
            (Some(code), _) => status(code).into_response(),
            (None, Some((receipt, body))) => Json(json!({ "receiptId": receipt, "body": body })).into_response(),
            (None, None) => Json(Value::Null).into_response(),
        };
        (response, gw.receive_delay)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    state.lock().unwrap().in_flight -= 1;
    response
}

async fn delete_notification(
    State(state): State<Shared>,
    Path((_instance, _token, receipt)): Path<(String, String, String)>,
) -> Json<Value> {
    let mut gw = state.lock().unwrap();
    let before = gw.queue.len();
    gw.queue.retain(|(r, _)| r.to_string() != receipt);
    let removed = gw.queue.len() != before;
    gw.deleted.push(receipt);
    Json(json!({ "result": removed }))
}

async fn send_message(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut gw = state.lock().unwrap();
    if let Some(code) = gw.send_status {
        return (status(code), "send rejected").into_response();
    }
    gw.sent.push(body);
    Json(json!({ "idMessage": format!("BAE5{}", gw.sent.len()) })).into_response()
}

async fn avatar(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    let gw = state.lock().unwrap();
    match gw.avatars.get(&name) {
        Some(bytes) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
