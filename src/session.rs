use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::io::{AsyncReadExt, AsyncWriteExt, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::codec::{self, ErrorFrame, ERROR_FRAME_LENGTH, PAYLOAD_SIZE_LIMIT};
use crate::dialer::Connect;
use crate::disconnection::{DisconnectionEvent, DisconnectionLog};
use crate::notification::Notification;
use crate::result::{Error, Result};
use crate::ring::RecentNotifications;

/// Tuning for a gateway session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// How long a queued send may wait for a connection before its handle
    /// fails with [`Error::NotificationTimeout`].
    pub timeout: Duration,
    /// First reconnect delay; doubles (with jitter) up to `max_backoff`.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            multiplier: 2.0,
            max_interval: self.max_backoff,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

enum Command {
    Write {
        notifications: Vec<Notification>,
        done: oneshot::Sender<Result<()>>,
    },
    Close,
}

/// Cheap clonable handle to a running session task.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    /// Queues notifications for transmission, in argument order, framed
    /// atomically with respect to other calls.
    ///
    /// Never blocks; the returned handle resolves once the bytes have been
    /// handed to the kernel. The binary protocol has no acknowledgement, so
    /// resolution does not mean Apple accepted anything; rejections arrive
    /// later as disconnection events.
    pub fn write(&self, notifications: Vec<Notification>) -> SendHandle {
        let (done, handle) = oneshot::channel();
        // A failed send means the task is gone; the dropped sender makes the
        // handle resolve with `Shutdown`.
        let _ = self.commands.send(Command::Write {
            notifications,
            done,
        });
        SendHandle { done: handle }
    }

    /// Shuts the session down. Outstanding handles fail with
    /// [`Error::Shutdown`].
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// Completion handle for one `write` call.
///
/// Resolves `Ok(())` when the frames reached the kernel, or with
/// `NotificationTimeout` / `Shutdown`. Dropping the handle cancels the send
/// if it is still waiting for a connection; bytes already submitted are not
/// recalled.
#[derive(Debug)]
pub struct SendHandle {
    done: oneshot::Receiver<Result<()>>,
}

impl Future for SendHandle {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.done).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Shutdown),
        })
    }
}

struct PendingSend {
    frames: Vec<u8>,
    deadline: Instant,
    done: oneshot::Sender<Result<()>>,
}

/// A gateway session: one task owning one (reconnecting) TLS connection.
///
/// The task serializes everything: identifier allocation, ring bookkeeping,
/// framing, transmission, and error-frame attribution, so callers get FIFO
/// ordering per session without locks around the hot structures.
pub struct Session<C: Connect> {
    connector: Arc<C>,
    config: SessionConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    ring: RecentNotifications,
    log: Arc<Mutex<DisconnectionLog>>,
    pending: VecDeque<PendingSend>,
}

impl<C: Connect> Session<C> {
    /// Spawns the session task. Must be called within a Tokio runtime.
    ///
    /// The connection itself is lazy: nothing is dialed until the first
    /// `write`.
    pub fn spawn(
        connector: C,
        config: SessionConfig,
        log: Arc<Mutex<DisconnectionLog>>,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            connector: Arc::new(connector),
            config,
            commands: rx,
            ring: RecentNotifications::default(),
            log,
            pending: VecDeque::new(),
        };
        tokio::spawn(session.run());
        SessionHandle { commands: tx }
    }

    async fn run(mut self) {
        // Idle until there is something to send.
        loop {
            match self.commands.recv().await {
                Some(Command::Write {
                    notifications,
                    done,
                }) => {
                    if self.queue(notifications, done) {
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    self.shutdown();
                    return;
                }
            }
        }

        let mut backoff = self.config.backoff();
        loop {
            let stream = match self.establish(&mut backoff).await {
                ControlFlow::Continue(stream) => stream,
                ControlFlow::Break(()) => {
                    self.shutdown();
                    return;
                }
            };
            backoff.reset();

            if let ControlFlow::Break(()) = self.serve(stream).await {
                self.shutdown();
                return;
            }

            // The connection is gone; back off before dialing again.
            if let ControlFlow::Break(()) = self.backoff_wait(&mut backoff).await {
                self.shutdown();
                return;
            }
        }
    }

    /// Dials until a connection is up, backing off between attempts and
    /// serving submissions and deadlines meanwhile. `Break` means close.
    async fn establish(
        &mut self,
        backoff: &mut ExponentialBackoff,
    ) -> ControlFlow<(), C::Stream> {
        loop {
            debug!("connecting to gateway");
            let connector = Arc::clone(&self.connector);
            let mut attempt = tokio::spawn(async move { connector.connect().await });

            let error = loop {
                let deadline = self.pending.front().map(|send| send.deadline);
                tokio::select! {
                    outcome = &mut attempt => match outcome {
                        Ok(Ok(stream)) => return ControlFlow::Continue(stream),
                        Ok(Err(error)) => break error,
                        Err(join_error) => break io::Error::new(io::ErrorKind::Other, join_error),
                    },
                    command = self.commands.recv() => {
                        if self.handle_while_down(command) {
                            attempt.abort();
                            return ControlFlow::Break(());
                        }
                    }
                    _ = wait_until(deadline) => self.expire_pending(),
                }
            };
            warn!(%error, "gateway connection failed");

            if let ControlFlow::Break(()) = self.backoff_wait(backoff).await {
                return ControlFlow::Break(());
            }
        }
    }

    /// Sits out one backoff delay, still serving submissions and deadlines.
    async fn backoff_wait(&mut self, backoff: &mut ExponentialBackoff) -> ControlFlow<()> {
        let delay = backoff.next_backoff().unwrap_or(self.config.max_backoff);
        debug!(delay_ms = delay.as_millis() as u64, "waiting to reconnect");
        let until = Instant::now() + delay;
        loop {
            let deadline = self.pending.front().map(|send| send.deadline);
            tokio::select! {
                _ = sleep_until(until) => return ControlFlow::Continue(()),
                command = self.commands.recv() => {
                    if self.handle_while_down(command) {
                        return ControlFlow::Break(());
                    }
                }
                _ = wait_until(deadline) => self.expire_pending(),
            }
        }
    }

    /// Runs the connected phase until the transport dies (`Continue`, the
    /// caller reconnects) or the session is closed (`Break`).
    async fn serve(&mut self, stream: C::Stream) -> ControlFlow<()> {
        info!("gateway connection established");
        let (mut reader, mut writer) = tokio::io::split(stream);

        // Flush sends queued while the connection was down, oldest first.
        while let Some(send) = self.pending.pop_front() {
            if send.done.is_closed() {
                debug!("skipping cancelled send");
                continue;
            }
            if let Err(error) = transmit(&mut writer, &send.frames).await {
                warn!(%error, "flush failed, keeping send queued");
                self.pending.push_front(send);
                return ControlFlow::Continue(());
            }
            debug!(bytes = send.frames.len(), "queued notifications submitted");
            let _ = send.done.send(Ok(()));
        }

        let mut frame = [0u8; ERROR_FRAME_LENGTH];
        let mut filled = 0usize;
        loop {
            tokio::select! {
                read = reader.read(&mut frame[filled..]) => match read {
                    Ok(0) => {
                        if filled == 0 {
                            // Silent close: no error frame, so no event.
                            info!("gateway closed the connection");
                        } else {
                            warn!(bytes = filled, "connection closed mid error frame");
                        }
                        return ControlFlow::Continue(());
                    }
                    Ok(n) => {
                        filled += n;
                        if filled == ERROR_FRAME_LENGTH {
                            self.record_error_frame(&frame);
                            // APNS always closes after an error frame.
                            return ControlFlow::Continue(());
                        }
                    }
                    Err(error) => {
                        warn!(%error, "gateway read failed");
                        return ControlFlow::Continue(());
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Write { notifications, done }) => {
                        let frames = match self.encode_batch(&notifications) {
                            Ok(frames) => frames,
                            Err(error) => {
                                let _ = done.send(Err(error));
                                continue;
                            }
                        };
                        if done.is_closed() {
                            debug!("skipping cancelled send");
                            continue;
                        }
                        if let Err(error) = transmit(&mut writer, &frames).await {
                            warn!(%error, "gateway write failed, keeping send queued");
                            self.pending.push_back(PendingSend {
                                frames,
                                deadline: Instant::now() + self.config.timeout,
                                done,
                            });
                            return ControlFlow::Continue(());
                        }
                        debug!(bytes = frames.len(), "notifications submitted");
                        let _ = done.send(Ok(()));
                    }
                    Some(Command::Close) | None => return ControlFlow::Break(()),
                },
            }
        }
    }

    /// Queues a write while no connection is up. Returns `true` on close.
    fn handle_while_down(&mut self, command: Option<Command>) -> bool {
        match command {
            Some(Command::Write {
                notifications,
                done,
            }) => {
                self.queue(notifications, done);
                false
            }
            Some(Command::Close) | None => true,
        }
    }

    /// Encodes a batch into the pending queue. Returns `true` if queued.
    fn queue(
        &mut self,
        notifications: Vec<Notification>,
        done: oneshot::Sender<Result<()>>,
    ) -> bool {
        match self.encode_batch(&notifications) {
            Ok(frames) => {
                self.pending.push_back(PendingSend {
                    frames,
                    deadline: Instant::now() + self.config.timeout,
                    done,
                });
                true
            }
            Err(error) => {
                let _ = done.send(Err(error));
                false
            }
        }
    }

    /// Validates, remembers and frames a batch in argument order.
    ///
    /// Validation runs before any ring mutation so a rejected batch leaves
    /// no trace.
    fn encode_batch(&mut self, notifications: &[Notification]) -> Result<Vec<u8>> {
        for notification in notifications {
            let payload = serde_json::to_vec(&notification.payload)?;
            if payload.len() > PAYLOAD_SIZE_LIMIT {
                return Err(Error::PayloadTooLarge {
                    size: payload.len(),
                    limit: PAYLOAD_SIZE_LIMIT,
                });
            }
        }

        let mut frames = Vec::new();
        for notification in notifications {
            let internal = self.ring.insert(notification);
            codec::encode_notification(&mut frames, internal, notification)?;
        }
        Ok(frames)
    }

    fn record_error_frame(&self, bytes: &[u8; ERROR_FRAME_LENGTH]) {
        match ErrorFrame::decode(bytes) {
            Ok(frame) => {
                // We only ever put u16 identifiers on the wire, so the echo
                // fits back into one.
                let identifier = frame.identifier as u16;
                let offending = self.ring.lookup(identifier).cloned();
                warn!(
                    code = frame.status.code(),
                    identifier,
                    attributed = offending.is_some(),
                    "gateway rejected a notification: {}",
                    frame.status,
                );
                let event = DisconnectionEvent::new(frame.status, identifier, offending);
                self.log.lock().unwrap().push(event);
            }
            Err(error) => warn!(%error, "undecodable bytes from gateway"),
        }
    }

    fn expire_pending(&mut self) {
        let now = Instant::now();
        while self
            .pending
            .front()
            .map_or(false, |send| send.deadline <= now)
        {
            if let Some(expired) = self.pending.pop_front() {
                warn!("pending send timed out before the gateway came up");
                let _ = expired.done.send(Err(Error::NotificationTimeout(
                    self.config.timeout.as_secs(),
                )));
            }
        }
    }

    fn shutdown(&mut self) {
        info!("session closed");
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Write { done, .. } = command {
                let _ = done.send(Err(Error::Shutdown));
            }
        }
        for send in self.pending.drain(..) {
            let _ = send.done.send(Err(Error::Shutdown));
        }
    }
}

async fn transmit<S>(writer: &mut WriteHalf<S>, frames: &[u8]) -> io::Result<()>
where
    S: tokio::io::AsyncWrite,
{
    writer.write_all(frames).await?;
    writer.flush().await
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
