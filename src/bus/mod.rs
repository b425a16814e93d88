//! The dispatch loop that drives a reconciliation.
//!
//! Messages live on LIFO stacks. A handler answering with an ordered plan
//! has it pushed in reverse, so the head of the plan is the next message to
//! pop. When a handler answers with a domain error, the in-flight message is
//! parked on the dead-letter stack, the error's compensating command runs to
//! completion, and only then is the parked message re-examined — a mid-plan
//! check that failed is retried after its repair.

use std::mem::{discriminant, Discriminant};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{Command, DomainError, Event, Message};
use crate::errors::{Result, TableformError};

/// Consecutive error responses tolerated before a dispatch aborts.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// What a handler may answer with.
///
/// Errors are always singular; plans (`Messages`) carry commands and events
/// only.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Command(Command),
    Event(Event),
    Error(DomainError),
    Messages(Vec<Message>),
}

/// Handler set the bus dispatches into, one method per message family.
///
/// The default event handler absorbs any event without effect. Command
/// handlers must not fail on recoverable state mismatches; those are
/// expressed as [`Response::Error`] and compensated by the bus. A `Result`
/// error is terminal for the whole dispatch.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_command(&self, command: Command) -> Result<Response>;

    async fn handle_event(&self, _event: Event) -> Result<Response> {
        Ok(Response::Messages(Vec::new()))
    }

    /// The fixed error→command trigger map: which command repairs the
    /// mismatch. `None` makes the error terminal.
    fn compensation(&self, error: &DomainError) -> Option<Command>;
}

/// Where a message was popped from; responses extend the same stack.
#[derive(Clone, Copy)]
enum Origin {
    Queue,
    DeadLetter,
}

/// One level of dispatch: the primary stack plus parked messages awaiting
/// the completion of a compensation started below them.
struct Frame {
    queue: Vec<Message>,
    dead_letters: Vec<Message>,
}

impl Frame {
    fn rooted(message: Message) -> Self {
        Self {
            queue: vec![message],
            dead_letters: Vec::new(),
        }
    }

    fn pop(&mut self) -> Option<(Message, Origin)> {
        if let Some(message) = self.dead_letters.pop() {
            return Some((message, Origin::DeadLetter));
        }
        self.queue.pop().map(|message| (message, Origin::Queue))
    }

    fn stash(&mut self, message: Message) {
        self.dead_letters.push(message);
    }

    fn extend(&mut self, response: Response, origin: Origin) {
        let target = match origin {
            Origin::Queue => &mut self.queue,
            Origin::DeadLetter => &mut self.dead_letters,
        };
        match response {
            Response::Command(command) => target.push(Message::Command(command)),
            Response::Event(event) => target.push(Message::Event(event)),
            Response::Error(error) => target.push(Message::Error(error)),
            // Reverse-pushing a plan onto a stack yields head-first execution.
            Response::Messages(messages) => target.extend(messages.into_iter().rev()),
        }
    }
}

/// Message bus: routes commands, events, and domain errors through a
/// [`MessageHandler`] and records every dispatched message in order.
pub struct MessageBus<H> {
    handlers: H,
    log: Vec<Message>,
    retry_count: u32,
    max_retries: u32,
    scoped_retries: bool,
    last_error_kind: Option<Discriminant<DomainError>>,
}

impl<H: MessageHandler> MessageBus<H> {
    pub fn new(handlers: H) -> Self {
        Self {
            handlers,
            log: Vec::new(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            scoped_retries: false,
            last_error_kind: None,
        }
    }

    /// Overrides the retry budget shared by all errors of one dispatch.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Resets the retry counter whenever the originating error variant
    /// changes, scoping the budget per retry chain instead of per dispatch.
    /// Off by default: interleaved failures of different causes then share
    /// one budget.
    pub fn with_scoped_retries(mut self, scoped_retries: bool) -> Self {
        self.scoped_retries = scoped_retries;
        self
    }

    /// Ordered record of every message dispatched so far; kept across
    /// dispatches for post-mortems.
    pub fn log(&self) -> &[Message] {
        &self.log
    }

    /// Dispatches a root message and every follow-up it provokes.
    ///
    /// Ordering guarantees, for a single call:
    /// - the log records messages in the order they left the stacks;
    /// - handler plans execute head-first;
    /// - an error pre-empts the remaining messages until its compensation
    ///   completes or the retry budget is exhausted;
    /// - the message that surfaced an error is re-examined before any of
    ///   its queued successors.
    ///
    /// Recoverable mismatches are consumed internally. An `Err` is
    /// terminal: retry exhaustion, an unmapped domain error, or a
    /// repository failure other than not-found.
    pub async fn dispatch(&mut self, message: impl Into<Message>) -> Result<()> {
        let mut frames = vec![Frame::rooted(message.into())];

        while !frames.is_empty() {
            let popped = match frames.last_mut() {
                Some(frame) => frame.pop(),
                None => break,
            };
            let Some((message, origin)) = popped else {
                frames.pop();
                continue;
            };

            self.log.push(message.clone());
            debug!(?message, "dispatching message");

            match self.handle(message.clone()).await? {
                Response::Error(error) => {
                    let kind = discriminant(&error);
                    if self.scoped_retries && self.last_error_kind != Some(kind) {
                        self.retry_count = 0;
                    }
                    self.last_error_kind = Some(kind);

                    if self.retry_count > self.max_retries {
                        return Err(TableformError::MaxRetriesReached {
                            table_name: error.table_name().to_string(),
                            condition: error.to_string(),
                        });
                    }
                    self.retry_count += 1;
                    if let Some(frame) = frames.last_mut() {
                        // Park the in-flight message; it reruns once the
                        // compensation frame below drains.
                        frame.stash(message);
                    }
                    frames.push(Frame::rooted(Message::Error(error)));
                }
                response => {
                    // Only an event or a non-empty plan counts as progress;
                    // compensating commands and empty plans leave the
                    // budget untouched.
                    let made_progress = match &response {
                        Response::Event(_) => true,
                        Response::Messages(messages) => !messages.is_empty(),
                        Response::Command(_) | Response::Error(_) => false,
                    };
                    if made_progress {
                        self.retry_count = 0;
                    }
                    if let Some(frame) = frames.last_mut() {
                        frame.extend(response, origin);
                    }
                }
            }
        }

        Ok(())
    }

    /// Routes one message to the handler for its family.
    pub async fn handle(&self, message: Message) -> Result<Response> {
        match message {
            Message::Command(command) => self.handlers.handle_command(command).await,
            Message::Event(event) => self.handlers.handle_event(event).await,
            Message::Error(error) => match self.handlers.compensation(&error) {
                Some(command) => Ok(Response::Command(command)),
                None => Err(TableformError::UnhandledDomainError {
                    condition: error.to_string(),
                }),
            },
        }
    }
}
