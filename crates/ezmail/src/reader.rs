//! IMAP reading with search filters.

use ezmail_imap::{
    Authenticated, Client, FetchAttribute, ImapStream, Mailbox, NotAuthenticated, SelectRejected, Selected, SeqNum,
    SequenceSet,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::ReaderConfig;
use crate::credentials::{Credentials, Secret};
use crate::filters::{DEFAULT_MAILBOX, FetchFilters, StatusFilter};
use crate::mail::FetchedMail;
use crate::{Error, Result};

/// Where the IMAP session is in its lifecycle.
#[derive(Debug)]
enum Session<S> {
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
}

fn not_connected() -> Error {
    Error::Connection("not connected, call connect() first".to_string())
}

/// Reads mail from one authenticated IMAP session.
///
/// ```no_run
/// use ezmail::{Credentials, FetchFilters, Reader, ReaderConfig, ServerConfig, StatusFilter};
///
/// # async fn run() -> ezmail::Result<()> {
/// let config = ReaderConfig::new(ServerConfig::new("imap.example.com", 993));
/// let mut reader = Reader::new(config, Credentials::oauth2("me@example.com", "token"));
/// reader.connect().await?;
///
/// let filters = FetchFilters::new().status(StatusFilter::Unseen).limit(10);
/// let mut messages = reader.fetch_messages(&filters).await?;
/// while let Some(mail) = messages.next().await {
///     let mail = mail?;
///     println!("{}: {}", mail.sender, mail.subject);
/// }
/// reader.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Reader<S = ImapStream> {
    config: ReaderConfig,
    credentials: Credentials,
    session: Option<Session<S>>,
}

impl<S> Reader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a reader. Nothing is contacted until `connect`.
    #[must_use]
    pub const fn new(config: ReaderConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            session: None,
        }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Whether a session is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Currently selected mailbox.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        match &self.session {
            Some(Session::Selected(client)) => Some(client.mailbox().as_str()),
            _ => None,
        }
    }

    /// Reads the greeting and logs in over a caller-provided stream. No TLS
    /// is negotiated.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for bad config, [`Error::Connection`] if the
    /// greeting fails, [`Error::Authentication`] if the server refuses.
    pub async fn connect_with_stream(&mut self, stream: S) -> Result<()> {
        self.config.validate()?;
        self.credentials.validate()?;
        let client = Client::from_stream_with_timeout(stream, Some(self.config.imap.timeout()))
            .await
            .map_err(Error::from_imap)?;
        self.login(client).await
    }

    async fn login(&mut self, client: Client<S, NotAuthenticated>) -> Result<()> {
        let email = self.credentials.email();
        let result = match self.credentials.secret() {
            Secret::Password(password) => client.login(email, password).await,
            Secret::OAuth2(_) => {
                client
                    .authenticate("XOAUTH2", &self.credentials.xoauth2_response())
                    .await
            }
        };
        let client = result.map_err(|err| match err {
            ezmail_imap::Error::No { .. } | ezmail_imap::Error::Bad(_) | ezmail_imap::Error::InvalidState(_) => {
                Error::Authentication(err.to_string())
            }
            other => Error::from_imap(other),
        })?;

        info!(host = %self.config.imap.host, user = %email, "IMAP session ready");
        self.session = Some(Session::Authenticated(client));
        Ok(())
    }

    /// Names of all mailboxes, from `LIST "" "*"`.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] when not connected, otherwise any protocol
    /// failure.
    pub async fn list_mailboxes(&mut self) -> Result<Vec<String>> {
        let listed = match self.session.as_mut().ok_or_else(not_connected)? {
            Session::Authenticated(client) => client.list("", "*").await,
            Session::Selected(client) => client.list("", "*").await,
        }
        .map_err(Error::from_imap)?;
        Ok(listed
            .into_iter()
            .map(|entry| entry.mailbox.as_str().to_string())
            .collect())
    }

    /// Selects `name` and returns how many messages it holds.
    ///
    /// # Errors
    ///
    /// [`Error::MailboxNotFound`] if the server refuses, in which case the
    /// session stays usable with no mailbox selected.
    pub async fn select_mailbox(&mut self, name: &str) -> Result<u32> {
        let session = self.session.take().ok_or_else(not_connected)?;
        let selected = match session {
            Session::Authenticated(client) => client.select(name).await,
            Session::Selected(client) => client.select(name).await,
        };

        match selected {
            Ok(client) => {
                let exists = client.status().exists;
                info!(mailbox = name, exists, "mailbox selected");
                self.session = Some(Session::Selected(client));
                Ok(exists)
            }
            Err(SelectRejected { client, error }) => {
                if error.is_command_failure() {
                    warn!(mailbox = name, %error, "SELECT refused");
                    self.session = Some(Session::Authenticated(client));
                    Err(Error::MailboxNotFound(name.to_string()))
                } else {
                    Err(Error::from_imap(error))
                }
            }
        }
    }

    /// Searches with `filters` and returns a stream that fetches the
    /// matches one at a time.
    ///
    /// The mailbox is selected first unless it already is.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for bad filters, [`Error::MailboxNotFound`],
    /// or any SEARCH failure.
    pub async fn fetch_messages(&mut self, filters: &FetchFilters) -> Result<MessageStream<'_, S>> {
        filters.validate()?;
        let wanted = Mailbox::new(filters.mailbox.as_str());
        if self.selected_mailbox() != Some(wanted.as_str()) {
            self.select_mailbox(wanted.as_str()).await?;
        }
        let Some(Session::Selected(client)) = self.session.as_mut() else {
            return Err(not_connected());
        };

        let criteria = filters.criteria();
        let mut ids = client.search(&criteria).await.map_err(Error::from_imap)?;
        let found = ids.len();
        if let Some(limit) = filters.limit {
            ids.truncate(limit);
        }
        info!(mailbox = %wanted, found, fetching = ids.len(), "search finished");

        Ok(MessageStream {
            client,
            ids: ids.into_iter(),
            attributes: vec![
                FetchAttribute::Flags,
                FetchAttribute::Uid,
                FetchAttribute::InternalDate,
                FetchAttribute::full_body(!filters.mark_seen),
            ],
        })
    }

    /// Unseen messages of the selected mailbox, or of INBOX when none is
    /// selected.
    ///
    /// # Errors
    ///
    /// Same as [`Reader::fetch_messages`], plus any per-message failure.
    pub async fn fetch_unread(&mut self, limit: Option<usize>) -> Result<Vec<FetchedMail>> {
        let mailbox = self.selected_mailbox().unwrap_or(DEFAULT_MAILBOX).to_string();
        let mut filters = FetchFilters::new().mailbox(mailbox).status(StatusFilter::Unseen);
        filters.limit = limit;
        self.fetch_messages(&filters).await?.collect_all().await
    }

    /// Closes the selected mailbox and logs out. Failures are only logged.
    pub async fn disconnect(&mut self) {
        let client = match self.session.take() {
            None => return,
            Some(Session::Authenticated(client)) => client,
            Some(Session::Selected(client)) => match client.close().await {
                Ok(client) => client,
                Err(err) => {
                    warn!(error = %err, "CLOSE failed, dropping connection");
                    return;
                }
            },
        };
        match client.logout().await {
            Ok(()) => info!(host = %self.config.imap.host, "IMAP session closed"),
            Err(err) => warn!(error = %err, "LOGOUT failed, dropping connection"),
        }
    }
}

impl Reader<ImapStream> {
    /// Connects with TLS, STARTTLS or plaintext per the configuration and
    /// logs in.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for bad config, [`Error::Connection`] for
    /// network, TLS or timeout failures, [`Error::Authentication`] if the
    /// server refuses the credentials.
    pub async fn connect(&mut self) -> Result<()> {
        self.config.validate()?;
        self.credentials.validate()?;
        let imap = self.config.imap_config();
        info!(
            host = %imap.host,
            port = imap.port,
            security = self.config.imap.security().display_name(),
            "connecting to IMAP server"
        );

        let stream = ezmail_imap::connect(&imap).await.map_err(Error::from_imap)?;
        let client = Client::from_stream_with_timeout(stream, imap.io_timeout)
            .await
            .map_err(Error::from_imap)?;
        let client = if imap.security == ezmail_imap::Security::StartTls {
            client.starttls(&imap.host).await.map_err(Error::from_imap)?
        } else {
            client
        };
        self.login(client).await
    }
}

/// Lazily fetches the messages a search matched, in server order.
///
/// Each call to [`next`](MessageStream::next) issues one FETCH. The stream
/// cannot be restarted.
#[derive(Debug)]
pub struct MessageStream<'a, S> {
    client: &'a mut Client<S, Selected>,
    ids: std::vec::IntoIter<SeqNum>,
    attributes: Vec<FetchAttribute>,
}

impl<S> MessageStream<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Messages not yet fetched.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.ids.len()
    }

    /// Fetches and parses the next message. `None` once all are done.
    pub async fn next(&mut self) -> Option<Result<FetchedMail>> {
        let seq = self.ids.next()?;
        Some(self.fetch_one(seq).await)
    }

    /// Fetches everything left, stopping at the first error.
    ///
    /// # Errors
    ///
    /// The first fetch or parse failure.
    pub async fn collect_all(mut self) -> Result<Vec<FetchedMail>> {
        let mut mails = Vec::with_capacity(self.remaining());
        while let Some(mail) = self.next().await {
            mails.push(mail?);
        }
        Ok(mails)
    }

    async fn fetch_one(&mut self, seq: SeqNum) -> Result<FetchedMail> {
        let set = SequenceSet::single(seq.get()).ok_or_else(|| Error::Protocol(format!("invalid sequence number {seq}")))?;
        let mut responses = self
            .client
            .fetch(&set, &self.attributes)
            .await
            .map_err(Error::from_imap)?;
        let position = responses
            .iter()
            .position(|(number, _)| *number == seq)
            .ok_or_else(|| Error::Protocol(format!("server returned no data for message {seq}")))?;
        let (_, items) = responses.swap_remove(position);
        debug!(seq = seq.get(), "message fetched");
        FetchedMail::from_fetch(seq, items)
    }
}
