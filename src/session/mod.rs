//! Per-device session state machine: Connecting → Authenticating →
//! Configuring → Streaming → Closing → Closed, grounded in
//! `SimpleTCPClient` in `original_source/tcp/tcp_client.py`
//! (`connectionMade` → `authenticate` → `_handle_acknowledgment` →
//! send `lpr_settings` → dispatch table keyed by `messageType`).

pub mod messages;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tokio_util::codec::Framed;

use crate::bridge::Bridge;
use crate::canonical;
use crate::codec::FrameCodec;
use crate::config::AppConfig;
use crate::error::GatewayError;
use crate::ingest::IngestSink;
use crate::model::{CarDetection, DeviceRecord, LiveEvent, PlatesDataEvent, TrafficEvent};
use crate::settings_assembler::SettingsAssembler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Configuring,
    Streaming,
    Closing,
    Closed,
}

/// Collaborators a `Session` needs for one device's connection lifetime.
/// Constructed once by the `Supervisor` and reused across reconnects.
pub struct SessionContext {
    pub device: DeviceRecord,
    pub config: Arc<AppConfig>,
    pub connector: TlsConnector,
    pub assembler: Arc<SettingsAssembler>,
    pub bridge: Arc<Bridge>,
    pub ingest: Arc<dyn IngestSink>,
}

pub struct Session {
    ctx: SessionContext,
    state: SessionState,
}

impl Session {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs one connection attempt end to end. Returns once the
    /// connection closes (cleanly or with an error) — the `Supervisor`
    /// decides whether and when to call this again. `commands_rx` is
    /// owned by the supervisor's reconnect loop and outlives any single
    /// attempt, so it is borrowed rather than consumed here. `reached_streaming`
    /// is set the moment this attempt enters `Streaming`, independent of
    /// how the attempt eventually ends, so the caller can reset its
    /// backoff on a later failure too.
    pub async fn run(
        mut self,
        commands_rx: &mut mpsc::Receiver<Value>,
        reached_streaming: &AtomicBool,
    ) -> Result<(), GatewayError> {
        self.state = SessionState::Connecting;
        let device = &self.ctx.device;
        let addr = format!("{}:{}", device.ip, device.port);

        let tcp = timeout(self.ctx.config.dial_timeout(), TcpStream::connect(&addr))
            .await
            .map_err(|_| GatewayError::Protocol(format!("dial to {addr} timed out")))??;

        let server_name = ServerName::try_from(device.ip.clone())
            .map_err(|e| GatewayError::Protocol(format!("invalid server name {}: {e}", device.ip)))?;
        let tls_stream = self.ctx.connector.connect(server_name, tcp).await?;

        let codec = FrameCodec::<Value>::new(self.ctx.config.max_frame_bytes);
        let mut framed = Framed::new(tls_stream, codec);

        self.state = SessionState::Authenticating;
        let (auth_id, auth_msg) = messages::authentication(&device.auth_token);
        framed.send(auth_msg).await?;

        let ack = timeout(self.ctx.config.auth_timeout(), wait_for_ack(&mut framed, &auth_id))
            .await
            .map_err(|_| GatewayError::AuthTimeout(self.ctx.config.auth_timeout()))??;
        if !ack {
            return Err(GatewayError::AuthRejected);
        }

        self.state = SessionState::Configuring;
        let payload = self
            .ctx
            .assembler
            .assemble(device.id)
            .await
            .map_err(|e| GatewayError::Protocol(format!("settings assembly failed: {e}")))?;
        let settings_msg = messages::lpr_settings(
            &auth_id,
            self.ctx.config.hmac_secret_key.as_bytes(),
            &payload,
        )
        .map_err(|e| GatewayError::Protocol(format!("failed to sign settings: {e}")))?;
        framed.send(settings_msg).await?;

        self.state = SessionState::Streaming;
        reached_streaming.store(true, Ordering::Relaxed);
        loop {
            tokio::select! {
                inbound = framed.next() => {
                    match inbound {
                        Some(Ok(frame)) => self.dispatch(frame).await?,
                        Some(Err(e)) => return Err(e),
                        None => break,
                    }
                }
                outbound = commands_rx.recv() => {
                    match outbound {
                        Some(data) => {
                            let signed = messages::command(self.ctx.config.hmac_secret_key.as_bytes(), &data)
                                .map_err(|e| GatewayError::Protocol(format!("failed to sign command: {e}")))?;
                            framed.send(signed).await?;
                        }
                        None => break,
                    }
                }
            }
        }

        self.state = SessionState::Closed;
        Ok(())
    }

    async fn dispatch(&mut self, frame: Value) -> Result<(), GatewayError> {
        verify_inbound(self.ctx.config.hmac_secret_key.as_bytes(), &frame)?;

        match messages::message_type(&frame) {
            Some("plates_data") => self.handle_plates_data(frame).await,
            Some("live") => self.handle_live(frame).await,
            Some("command_response") => Ok(()),
            Some("acknowledge") => Ok(()),
            other => {
                tracing::warn!(message_type = ?other, device_id = self.ctx.device.id, "unknown message type");
                Ok(())
            }
        }
    }

    /// Mirrors `_handle_plates_data` in `tcp_client.py`: projects each
    /// detected car, broadcasts to the camera's WS room, and records a
    /// durable traffic row independent of whether anyone is subscribed.
    async fn handle_plates_data(&mut self, frame: Value) -> Result<(), GatewayError> {
        let body = frame.get("messageBody").cloned().unwrap_or(Value::Null);
        let camera_id = body.get("camera_id").and_then(Value::as_i64).unwrap_or_default();
        let timestamp = body
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string);
        let full_image = body.get("full_image").and_then(Value::as_str).map(str::to_string);

        let cars: Vec<CarDetection> = body
            .get("cars")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(project_car)
            .collect();

        let event = PlatesDataEvent {
            message_type: "plates_data",
            timestamp,
            camera_id,
            full_image,
            cars: cars.clone(),
        };

        self.ctx
            .bridge
            .broadcast(camera_id, serde_json::to_value(&event).unwrap_or(Value::Null))
            .await;

        for car in cars {
            let traffic = TrafficEvent {
                camera_id,
                timestamp: Utc::now(),
                plate_number: car.plate_number,
                ocr_accuracy: Some(car.ocr_accuracy),
                vision_speed: Some(car.vision_speed.to_string()),
            };
            if let Err(e) = self.ctx.ingest.record(traffic).await {
                tracing::warn!(camera_id, error = %e, "failed to record traffic event");
            }
        }

        Ok(())
    }

    /// Broadcasts inline, like `handle_plates_data` — a detached spawn
    /// here would let `live` events race `plates_data` events for the
    /// same room's write lock and arrive out of order.
    async fn handle_live(&self, frame: Value) -> Result<(), GatewayError> {
        let body = frame.get("messageBody").cloned().unwrap_or(Value::Null);
        let camera_id = body.get("camera_id").and_then(Value::as_i64).unwrap_or_default();
        let live_image = body.get("live_image").and_then(Value::as_str).map(str::to_string);
        let event = LiveEvent {
            message_type: "live",
            camera_id,
            live_image,
        };
        self.ctx
            .bridge
            .broadcast(camera_id, serde_json::to_value(&event).unwrap_or(Value::Null))
            .await;
        Ok(())
    }
}

/// Verifies the `hmac` carried by an inbound frame against its signed
/// `data`, if present — unsigned message types (`acknowledge`,
/// `command_response`) pass through untouched.
fn verify_inbound(secret: &[u8], frame: &Value) -> Result<(), GatewayError> {
    let Some(hmac_hex) = messages::hmac(frame) else {
        return Ok(());
    };
    let data = messages::data(frame);
    if canonical::verify(secret, &data, hmac_hex) {
        Ok(())
    } else {
        Err(GatewayError::Protocol(format!(
            "hmac mismatch on inbound {:?} frame",
            messages::message_type(frame)
        )))
    }
}

fn project_car(raw: Value) -> CarDetection {
    let plate = raw.get("plate").cloned().unwrap_or(Value::Null);
    CarDetection {
        plate_number: plate
            .get("plate")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
        plate_image: plate
            .get("plate_image")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        ocr_accuracy: raw
            .get("ocr_accuracy")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        vision_speed: raw.get("vision_speed").and_then(Value::as_f64).unwrap_or(0.0),
        vehicle_class: raw.get("vehicle_class").cloned().unwrap_or(Value::Object(Default::default())),
        vehicle_type: raw.get("vehicle_type").cloned().unwrap_or(Value::Object(Default::default())),
        vehicle_color: raw.get("vehicle_color").cloned().unwrap_or(Value::Object(Default::default())),
    }
}

async fn wait_for_ack<S>(framed: &mut Framed<S, FrameCodec<Value>>, auth_id: &str) -> Result<bool, GatewayError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        match framed.next().await {
            Some(Ok(frame)) => {
                if messages::message_type(&frame) == Some("acknowledge")
                    && messages::reply_to(&frame) == Some(auth_id)
                {
                    return Ok(true);
                }
            }
            Some(Err(e)) => return Err(e),
            None => return Ok(false),
        }
    }
}
