use crate::sftp::handler::LoopbackSftp;
use crate::sftp::server::{ServerAccount, UnameReply};
use russh::keys::ssh_key;
use russh::server::{Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One SSH connection to the loopback server
pub struct SshSession {
    /// Session channels waiting for a subsystem or exec request
    channels: HashMap<ChannelId, Channel<Msg>>,
    /// Login and filesystem shared by every connection
    account: Arc<ServerAccount>,
}

impl SshSession {
    /// Create a session for one accepted connection
    pub fn new(account: Arc<ServerAccount>) -> Self {
        Self { channels: HashMap::new(), account }
    }
}

impl russh::server::Handler for SshSession {
    type Error = anyhow::Error;

    /// Accepts only the account's username and password
    async fn auth_password(
        &mut self,
        user: &str,
        password: &str,
    ) -> Result<Auth, Self::Error> {
        if user == self.account.username && password == self.account.password {
            info!("Loopback login accepted for {}", user);
            return Ok(Auth::Accept);
        }

        warn!("Loopback login rejected for {}", user);
        Ok(Auth::Reject { proceed_with_methods: None, partial_success: false })
    }

    /// Disables public key authentication
    async fn auth_publickey(
        &mut self,
        _user: &str,
        _public_key: &ssh_key::PublicKey,
    ) -> Result<Auth, Self::Error> {
        Ok(Auth::Reject { proceed_with_methods: None, partial_success: false })
    }

    /// Keeps new session channels until a request claims them
    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        debug!("Loopback channel opened: {:?}", channel.id());
        self.channels.insert(channel.id(), channel);
        Ok(true)
    }

    /// Closes a channel once the client is done sending
    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if let Err(e) = session.close(channel) {
            debug!("Loopback channel {:?} already closed: {}", channel, e);
        }
        Ok(())
    }

    /// Answers `uname -s` as the account says; other commands exit 127
    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).trim().to_string();
        debug!("Loopback exec: {}", command);
        session.channel_success(channel)?;

        match (&self.account.uname, command.as_str()) {
            (UnameReply::Hang, "uname -s") => {
                // channel stays in the map and is never closed
                debug!("Loopback leaving {:?} open", channel);
                return Ok(());
            }
            (UnameReply::Output(name), "uname -s") => {
                let reply = format!("{}\n", name);
                session.data(channel, CryptoVec::from_slice(reply.as_bytes()))?;
                session.exit_status_request(channel, 0)?;
            }
            _ => session.exit_status_request(channel, 127)?,
        }

        self.channels.remove(&channel);
        session.eof(channel)?;
        session.close(channel)?;
        Ok(())
    }

    /// Runs the SFTP subsystem; any other subsystem is refused
    async fn subsystem_request(
        &mut self,
        channel_id: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let channel = match self.channels.remove(&channel_id) {
            Some(channel) if name == "sftp" => channel,
            _ => {
                warn!("Loopback refusing subsystem {}", name);
                session.channel_failure(channel_id)?;
                return Ok(());
            }
        };

        session.channel_success(channel_id)?;
        let sftp = LoopbackSftp::new(self.account.root_dir.clone());
        russh_sftp::server::run(channel.into_stream(), sftp).await;
        Ok(())
    }
}
