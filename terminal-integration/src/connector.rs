use crate::cancel::CancelToken;
use crate::candle::{HistoryCandle, LiveCandle};
use crate::codec::{decode_line, encode_line};
use crate::error::SocketError;
use crate::protocol::{
    cmd, req, Callback, FuturesHolding, PortfolioLimits, Request, Response, TransactionAck,
    TransactionRequest,
};
use crate::tz::seconds_since_midnight;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

type PendingMap = std::sync::Mutex<HashMap<i64, oneshot::Sender<Result<Response, SocketError>>>>;

/// Default size of the live-candle broadcast channel. Sized generously since
/// a lagging subscriber only loses candles, it never blocks the reader.
const CANDLE_CHANNEL_CAPACITY: usize = 1024;

/// Largest history-candle count a single `getCandles` request will ask for.
/// The terminal will happily unmarshal a pathologically large response;
/// this bound exists purely on the client side.
pub const MAX_HISTORY_CANDLES: u32 = 5000;

/// A long-lived duplex connection to one terminal instance: a synchronous
/// request/response socket on port `P` and an asynchronous callback-drain
/// socket on port `P+1`. Owns both sockets and the in-flight-queries table;
/// nothing else should touch either.
pub struct Connector {
    write_half: AsyncMutex<OwnedWriteHalf>,
    pending: PendingMap,
    next_id: AtomicI64,
    next_trans_id: AtomicI64,
    candles_tx: broadcast::Sender<LiveCandle>,
    terminated: AtomicBool,
}

impl Connector {
    /// Dials both sockets and spawns the reader tasks. A dial failure here is
    /// fatal: the caller must not attempt to use a half-constructed connector.
    pub async fn connect(host: IpAddr, port: u16) -> Result<Arc<Self>, SocketError> {
        let query_addr = (host, port);
        let callback_addr = (host, port + 1);

        let query_stream = TcpStream::connect(query_addr)
            .await
            .map_err(|e| SocketError::Dial(format!("{query_addr:?}"), e.to_string()))?;
        let callback_stream = TcpStream::connect(callback_addr)
            .await
            .map_err(|e| SocketError::Dial(format!("{callback_addr:?}"), e.to_string()))?;

        let (query_read, query_write) = query_stream.into_split();
        let (callback_read, _callback_write) = callback_stream.into_split();

        let seed = seconds_since_midnight(Utc::now());
        let (candles_tx, _) = broadcast::channel(CANDLE_CHANNEL_CAPACITY);

        let connector = Arc::new(Self {
            write_half: AsyncMutex::new(query_write),
            pending: std::sync::Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(seed),
            next_trans_id: AtomicI64::new(seed),
            candles_tx,
            terminated: AtomicBool::new(false),
        });

        connector.clone().spawn_query_reader(query_read);
        connector.clone().spawn_callback_reader(callback_read);

        info!(host = %host, port, "connected to terminal");
        Ok(connector)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn live_candles(&self) -> broadcast::Receiver<LiveCandle> {
        self.candles_tx.subscribe()
    }

    pub async fn is_connected(&self) -> Result<bool, SocketError> {
        let response = self
            .call(req::IS_CONNECTED, json!({}), CancelToken::new())
            .await?;
        Ok(response.data.as_bool().unwrap_or(false))
    }

    pub async fn portfolio_info(
        &self,
        firm: &str,
        account: &str,
        limit_kind: i32,
    ) -> Result<Option<PortfolioLimits>, SocketError> {
        let response = self
            .call(
                req::GET_PORTFOLIO_INFO,
                json!({ "firmid": firm, "trdaccid": account, "limit_kind": limit_kind }),
                CancelToken::new(),
            )
            .await?;
        decode_nullable(response.data)
    }

    pub async fn futures_holding(
        &self,
        firm: &str,
        account: &str,
        security_code: &str,
        pos_type: i32,
    ) -> Result<Option<FuturesHolding>, SocketError> {
        let response = self
            .call(
                req::GET_FUTURES_HOLDING,
                json!({
                    "firmid": firm,
                    "trdaccid": account,
                    "seccode": security_code,
                    "type": pos_type,
                }),
                CancelToken::new(),
            )
            .await?;
        decode_nullable(response.data)
    }

    /// Assigns `TRANS_ID`/`CLIENT_CODE` atomically and submits the order.
    /// Every field is serialized as a string per the terminal's requirement.
    pub async fn send_transaction(
        &self,
        tx: TransactionRequest,
    ) -> Result<TransactionAck, SocketError> {
        let trans_id = self.next_trans_id.fetch_add(1, Ordering::SeqCst);

        let fields = json!({
            "TRANS_ID": trans_id.to_string(),
            "ACTION": "NEW_ORDER",
            "ACCOUNT": tx.account,
            "CLASSCODE": tx.classcode,
            "SECCODE": tx.seccode,
            "QUANTITY": tx.quantity.to_string(),
            "OPERATION": tx.operation.as_str(),
            "PRICE": tx.price,
            "CLIENT_CODE": trans_id.to_string(),
        });

        self.call(req::SEND_TRANSACTION, fields, CancelToken::new())
            .await?;
        Ok(TransactionAck { trans_id })
    }

    pub async fn last_candles(
        &self,
        class_code: &str,
        security_code: &str,
        interval: u32,
        count: u32,
    ) -> Result<Vec<HistoryCandle>, SocketError> {
        let clamped = count.min(MAX_HISTORY_CANDLES);
        let response = self
            .call(
                req::GET_CANDLES,
                json!({
                    "classcode": class_code,
                    "seccode": security_code,
                    "interval": interval,
                    "count": clamped,
                }),
                CancelToken::new(),
            )
            .await?;
        serde_json::from_value(response.data)
            .map_err(|e| SocketError::Decode(format!("history candles: {e}")))
    }

    pub async fn subscribe_candles(
        &self,
        class_code: &str,
        security_code: &str,
        interval: u32,
    ) -> Result<(), SocketError> {
        self.call(
            req::SUBSCRIBE_CANDLES,
            json!({
                "classcode": class_code,
                "seccode": security_code,
                "interval": interval,
            }),
            CancelToken::new(),
        )
        .await?;
        Ok(())
    }

    /// Writes a request under the exclusive write lock, registers a reply
    /// slot keyed by its `id` *before* writing (so a fast reply can never
    /// race ahead of registration), then awaits either the reply or
    /// cancellation.
    async fn call(
        &self,
        cmd: &str,
        data: Value,
        cancel: CancelToken,
    ) -> Result<Response, SocketError> {
        if self.is_terminated() {
            return Err(SocketError::ConnectionLost);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        let request = Request {
            id,
            cmd: cmd.to_string(),
            t: Utc::now().timestamp_micros(),
            data,
        };
        let line = encode_line(&serde_json::to_string(&request).map_err(|e| {
            SocketError::Decode(format!("failed to encode request: {e}"))
        })?);

        {
            let mut write_half = self.write_half.lock().await;
            if let Err(e) = write_half.write_all(&line).await {
                self.pending.lock().unwrap().remove(&id);
                return Err(SocketError::Write(e.to_string()));
            }
            if let Err(e) = write_half.flush().await {
                self.pending.lock().unwrap().remove(&id);
                return Err(SocketError::Write(e.to_string()));
            }
        }

        tokio::select! {
            reply = rx => {
                match reply {
                    Ok(result) => result,
                    Err(_) => Err(SocketError::ConnectionLost),
                }
            }
            _ = cancel.cancelled() => {
                Err(SocketError::Cancelled)
            }
        }
    }

    fn spawn_query_reader(self: Arc<Self>, read_half: OwnedReadHalf) {
        tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => {
                        error!("query socket closed by peer");
                        self.terminate(SocketError::ConnectionLost);
                        break;
                    }
                    Ok(_) => {
                        if let Err(err) = self.dispatch_response(&buf) {
                            error!(%err, "fatal protocol error on query socket");
                            self.terminate(err);
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "read failed on query socket");
                        self.terminate(SocketError::Read(e.to_string()));
                        break;
                    }
                }
            }
        });
    }

    fn dispatch_response(&self, raw: &[u8]) -> Result<(), SocketError> {
        let line = trim_newline(raw);
        if line.is_empty() {
            return Ok(());
        }
        let text = decode_line(line)?;
        let response: Response = serde_json::from_str(&text)
            .map_err(|e| SocketError::Decode(format!("response: {e}")))?;

        let slot = self.pending.lock().unwrap().remove(&response.id);
        match slot {
            Some(sender) => {
                let result = if response.lua_error.is_empty() {
                    Ok(response)
                } else {
                    Err(SocketError::LuaError(response.lua_error.clone()))
                };
                // Receiver may already be gone if the caller cancelled locally;
                // that is not a protocol error.
                let _ = sender.send(result);
                Ok(())
            }
            None => Err(SocketError::UnmatchedId(response.id)),
        }
    }

    fn spawn_callback_reader(self: Arc<Self>, read_half: OwnedReadHalf) {
        tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => {
                        warn!("callback socket closed by peer");
                        break;
                    }
                    Ok(_) => self.dispatch_callback(&buf),
                    Err(e) => {
                        warn!(error = %e, "read failed on callback socket, callbacks best-effort");
                        break;
                    }
                }
            }
        });
    }

    fn dispatch_callback(&self, raw: &[u8]) {
        let line = trim_newline(raw);
        if line.is_empty() {
            return;
        }
        let text = match decode_line(line) {
            Ok(t) => t,
            Err(e) => {
                debug!(%e, "dropping undecodable callback frame");
                return;
            }
        };
        let callback: Callback = match serde_json::from_str(&text) {
            Ok(c) => c,
            Err(e) => {
                debug!(%e, "dropping unparseable callback frame");
                return;
            }
        };

        match callback.cmd.as_str() {
            cmd::NEW_CANDLE => match serde_json::from_value::<LiveCandle>(callback.data) {
                Ok(candle) => {
                    let _ = self.candles_tx.send(candle);
                }
                Err(e) => debug!(%e, "dropping undecodable NewCandle callback"),
            },
            cmd::ON_CONNECTED | cmd::ON_DISCONNECTED | cmd::ON_TRADE => {
                debug!(cmd = callback.cmd, "drained callback, not consumed by core");
            }
            cmd::ON_PARAM | cmd::ON_FUTURES_LIMIT_CHANGE | cmd::ON_FUTURES_CLIENT_HOLDING => {
                // High-volume, read and discarded at engine level per the wire contract.
            }
            other => {
                debug!(cmd = other, "drained unrecognized callback");
            }
        }
    }

    /// Marks the connector terminated and releases every in-flight caller
    /// with the given error. Idempotent.
    fn terminate(&self, err: SocketError) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        let pending = std::mem::take(&mut *self.pending.lock().unwrap());
        for (_, sender) in pending {
            let _ = sender.send(Err(err.clone()));
        }
    }
}

fn trim_newline(raw: &[u8]) -> &[u8] {
    let mut end = raw.len();
    while end > 0 && (raw[end - 1] == b'\n' || raw[end - 1] == b'\r') {
        end -= 1;
    }
    &raw[..end]
}

fn decode_nullable<T: serde::de::DeserializeOwned>(
    data: Value,
) -> Result<Option<T>, SocketError> {
    if data.is_null() {
        return Ok(None);
    }
    serde_json::from_value(data)
        .map(Some)
        .map_err(|e| SocketError::Decode(format!("nullable record: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::TcpListener;

    async fn spawn_fake_terminal() -> (std::net::SocketAddr, TcpListener, TcpListener) {
        let query_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = query_listener.local_addr().unwrap();
        let callback_listener =
            TcpListener::bind((addr.ip(), addr.port() + 1)).await.unwrap();
        (addr, query_listener, callback_listener)
    }

    #[tokio::test]
    async fn request_response_round_trips_by_id() {
        let (addr, query_listener, _callback_listener) = spawn_fake_terminal().await;

        tokio::spawn(async move {
            let (stream, _) = query_listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut buf = Vec::new();
            reader.read_until(b'\n', &mut buf).await.unwrap();
            let text = decode_line(trim_newline(&buf)).unwrap();
            let request: Request = serde_json::from_str(&text).unwrap();

            let response = json!({
                "id": request.id,
                "cmd": request.cmd,
                "t": 0,
                "data": true,
                "lua_error": "",
            });
            let line = encode_line(&response.to_string());
            write_half.write_all(&line).await.unwrap();
        });

        let connector = Connector::connect(addr.ip(), addr.port()).await.unwrap();
        let connected = tokio::time::timeout(Duration::from_secs(1), connector.is_connected())
            .await
            .unwrap()
            .unwrap();
        assert!(connected);
    }

    #[tokio::test]
    async fn lua_error_surfaces_as_error_without_killing_connector() {
        let (addr, query_listener, _callback_listener) = spawn_fake_terminal().await;

        tokio::spawn(async move {
            let (stream, _) = query_listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut buf = Vec::new();
            reader.read_until(b'\n', &mut buf).await.unwrap();
            let text = decode_line(trim_newline(&buf)).unwrap();
            let request: Request = serde_json::from_str(&text).unwrap();

            let response = json!({
                "id": request.id,
                "cmd": request.cmd,
                "t": 0,
                "data": null,
                "lua_error": "boom",
            });
            let line = encode_line(&response.to_string());
            write_half.write_all(&line).await.unwrap();
        });

        let connector = Connector::connect(addr.ip(), addr.port()).await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), connector.is_connected())
            .await
            .unwrap();
        assert!(matches!(result, Err(SocketError::LuaError(_))));
        assert!(!connector.is_terminated());
    }
}
