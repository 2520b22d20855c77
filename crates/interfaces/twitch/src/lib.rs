pub mod irc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use factbot_config::TwitchConfig;
use factbot_runtime::{ChatMessage, DeliverySink, FactBot};

use crate::irc::{IrcMessage, MAX_MESSAGE_CHARS, chunk_message, sanitize};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const OUTBOX_CAP: usize = 64;

/// Everything needed to log in to Twitch chat.
#[derive(Debug, Clone)]
pub struct TwitchSettings {
    pub server: String,
    pub token: String,
    pub nick: String,
    pub channel: String,
}

impl TwitchSettings {
    /// Combine the `[twitch]` config with the `TWITCH_TOKEN` secret.
    pub fn from_env(config: &TwitchConfig) -> Result<Self> {
        let token = std::env::var("TWITCH_TOKEN")
            .map_err(|_| anyhow::anyhow!("TWITCH_TOKEN is not set"))?;
        Self::new(config, &token)
    }

    pub fn new(config: &TwitchConfig, token: &str) -> Result<Self> {
        let token = token.trim();
        let token = token.strip_prefix("oauth:").unwrap_or(token);
        if token.is_empty() {
            bail!("TWITCH_TOKEN is empty");
        }
        if config.channel.trim().is_empty() {
            bail!("no channel configured (set CHANNEL_NAME or [twitch].channel)");
        }
        if config.bot_username.trim().is_empty() {
            bail!("no bot username configured (set BOT_USERNAME or [twitch].bot_username)");
        }
        Ok(Self {
            server: config.server.clone(),
            token: token.to_string(),
            nick: config.bot_username.trim().to_lowercase(),
            channel: config.channel.trim().trim_start_matches('#').to_lowercase(),
        })
    }
}

/// A periodic post waiting for the session to write it.
struct Post {
    text: String,
    done: oneshot::Sender<Result<()>>,
}

impl Post {
    fn reject(self, reason: &str) {
        let _ = self.done.send(Err(anyhow!("{reason}")));
    }
}

/// Delivers periodic posts to the joined channel.  Resolves once the
/// session has written the text to the socket, and fails while the
/// connection is down instead of queueing stale posts.
pub struct ChannelSink {
    outbox: mpsc::Sender<Post>,
    connected: watch::Receiver<bool>,
}

#[async_trait]
impl DeliverySink for ChannelSink {
    async fn deliver(&self, text: &str) -> Result<()> {
        if !*self.connected.borrow() {
            bail!("not connected to chat");
        }
        let (done, written) = oneshot::channel();
        let post = Post {
            text: text.to_string(),
            done,
        };
        self.outbox
            .send(post)
            .await
            .map_err(|_| anyhow!("chat connection closed"))?;
        written
            .await
            .map_err(|_| anyhow!("chat session ended before the post was sent"))?
    }
}

/// Fail every post still queued so no caller waits on a dead session and
/// nothing goes out stale after a reconnect.
fn reject_queued(outbox: &mut mpsc::Receiver<Post>, reason: &str) {
    while let Ok(post) = outbox.try_recv() {
        post.reject(reason);
    }
}

enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Run the chat bot until `shutdown` flips to `true`, reconnecting after
/// transport errors.
pub async fn start_bot(
    bot: Arc<FactBot>,
    settings: TwitchSettings,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<Post>(OUTBOX_CAP);
    let (connected_tx, connected_rx) = watch::channel(false);

    let sink = Arc::new(ChannelSink {
        outbox: outbox_tx,
        connected: connected_rx,
    });
    let scheduler = bot.spawn_scheduler(sink, shutdown.clone());

    loop {
        if *shutdown.borrow() {
            break;
        }
        let outcome = run_session(&bot, &settings, &mut outbox_rx, &connected_tx, &mut shutdown).await;
        let _ = connected_tx.send(false);
        reject_queued(&mut outbox_rx, "chat connection lost");
        match outcome {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Disconnected) => {
                warn!("chat connection closed; reconnecting in {}s", RECONNECT_DELAY.as_secs());
            }
            Err(err) => {
                error!(?err, "chat session failed; reconnecting in {}s", RECONNECT_DELAY.as_secs());
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    outbox_rx.close();
    reject_queued(&mut outbox_rx, "chat bot stopped");

    if let Some(handle) = scheduler {
        match handle.await {
            Ok(stats) => info!(posted = stats.posted, failures = stats.failures, "scheduler finished"),
            Err(err) => warn!(?err, "scheduler task ended abnormally"),
        }
    }
    info!("chat bot stopped");
    Ok(())
}

async fn run_session(
    bot: &FactBot,
    settings: &TwitchSettings,
    outbox: &mut mpsc::Receiver<Post>,
    connected: &watch::Sender<bool>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<SessionEnd> {
    let stream = TcpStream::connect(&settings.server).await?;
    let (reader, writer) = stream.into_split();
    serve_session(bot, settings, BufReader::new(reader), writer, outbox, connected, shutdown).await
}

/// Log in, then answer the server and chat until the connection ends.
async fn serve_session<R, W>(
    bot: &FactBot,
    settings: &TwitchSettings,
    reader: R,
    mut writer: W,
    outbox: &mut mpsc::Receiver<Post>,
    connected: &watch::Sender<bool>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<SessionEnd>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    send_raw(&mut writer, "CAP REQ :twitch.tv/tags twitch.tv/commands").await?;
    send_raw(&mut writer, &format!("PASS oauth:{}", settings.token)).await?;
    send_raw(&mut writer, &format!("NICK {}", settings.nick)).await?;
    send_raw(&mut writer, &format!("JOIN #{}", settings.channel)).await?;
    info!(server = %settings.server, channel = %settings.channel, "connecting to chat");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    let _ = send_raw(&mut writer, &format!("PART #{}", settings.channel)).await;
                    return Ok(SessionEnd::Shutdown);
                }
            }
            Some(post) = outbox.recv() => {
                match say(&mut writer, &settings.channel, &post.text).await {
                    Ok(()) => {
                        let _ = post.done.send(Ok(()));
                    }
                    Err(err) => {
                        post.reject(&format!("chat write failed: {err:#}"));
                        return Err(err);
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(SessionEnd::Disconnected);
                };
                let Some(message) = IrcMessage::parse(&line) else {
                    continue;
                };
                match message.command.as_str() {
                    "PING" => {
                        let token = message.trailing().unwrap_or("tmi.twitch.tv");
                        send_raw(&mut writer, &format!("PONG :{token}")).await?;
                    }
                    "RECONNECT" => return Ok(SessionEnd::Disconnected),
                    "NOTICE" => {
                        let text = message.trailing().unwrap_or_default();
                        if text.contains("Login authentication failed") || text.contains("Improperly formatted auth") {
                            bail!("twitch rejected the login: {text}");
                        }
                        debug!(text, "notice");
                    }
                    "JOIN" if message.nick() == Some(settings.nick.as_str()) => {
                        let _ = connected.send(true);
                        info!(channel = %settings.channel, "joined channel");
                    }
                    "PRIVMSG" => {
                        let (Some(author), Some(text)) = (message.nick(), message.trailing()) else {
                            continue;
                        };
                        let mut chat = ChatMessage::new(author, text);
                        chat.privileged = message.is_privileged();
                        if let Some(reply) = bot.handle(&chat).await {
                            say(&mut writer, &settings.channel, &reply).await?;
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn say<W: AsyncWrite + Unpin>(writer: &mut W, channel: &str, text: &str) -> Result<()> {
    for chunk in chunk_message(&sanitize(text), MAX_MESSAGE_CHARS) {
        send_raw(writer, &format!("PRIVMSG #{channel} :{chunk}")).await?;
    }
    Ok(())
}

async fn send_raw<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(())
}
