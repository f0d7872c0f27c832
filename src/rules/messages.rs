//! Severity-tagged message log for rule findings.
//!
//! Validation never fails a method. Instead rules record [`Message`]s in a shared
//! [`MessageLog`], and whatever drives the pipeline decides what to do with them.
//!
//! # Architecture
//!
//! - [`Message`] - A single finding with severity, source location and reporting rule
//! - [`MessageLog`] - Thread-safe append-only collection with query and summary helpers
//! - [`MessageBuilder`] - Fluent API for creating messages, recorded on drop
//!
//! # Example
//!
//! ```rust
//! use sandscope::rules::{MessageLog, Severity, SourceLocation};
//!
//! let log = MessageLog::new();
//! let location = SourceLocation::new("com/example/Task", "run", "()V").at(4);
//!
//! log.record(Severity::Warning)
//!     .at(location)
//!     .rule("CatchGuardRule")
//!     .message("Injected runtime check for catch-block for type java.lang.Error");
//!
//! assert_eq!(log.warnings().count(), 1);
//! assert_eq!(log.summary(), "1 warning");
//! ```

use std::{collections::HashMap, fmt};

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Severity of a message, ordered from least to most severe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Detailed tracing of rule activity
    Trace,
    /// Something noteworthy that needs no action
    Informational,
    /// Suspicious code that was instrumented or tolerated
    Warning,
    /// Code that breaks a rule
    Error,
}

impl Severity {
    /// Returns the plural noun used in summaries.
    #[must_use]
    pub fn plural(self) -> &'static str {
        match self {
            Severity::Trace => "traces",
            Severity::Informational => "notes",
            Severity::Warning => "warnings",
            Severity::Error => "errors",
        }
    }

    fn singular(self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Informational => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Where in the rewritten code a message originates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SourceLocation {
    /// Owner type in internal form
    pub class_name: String,
    /// Method name
    pub member_name: String,
    /// Method descriptor
    pub signature: String,
    /// Index of the triggering instruction in the original stream
    pub instruction: Option<usize>,
}

impl SourceLocation {
    /// Creates a location for a whole member.
    pub fn new(
        class_name: impl Into<String>,
        member_name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            member_name: member_name.into(),
            signature: signature.into(),
            instruction: None,
        }
    }

    /// Narrows the location to one instruction.
    #[must_use]
    pub fn at(mut self, instruction: usize) -> Self {
        self.instruction = Some(instruction);
        self
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class_name, self.member_name, self.signature)?;
        if let Some(index) = self.instruction {
            write!(f, " @{index}")?;
        }
        Ok(())
    }
}

/// A single recorded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// How severe the finding is
    pub severity: Severity,
    /// Where it was found (if applicable)
    pub location: Option<SourceLocation>,
    /// Human-readable description
    pub message: String,
    /// Name of the reporting rule (if any)
    pub rule: Option<String>,
}

impl Message {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            location: None,
            message: message.into(),
            rule: None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({location})")?;
        }
        Ok(())
    }
}

/// Builder for creating messages with a fluent API.
///
/// Created by [`MessageLog::record`]. The message is added to the log when the builder
/// is dropped, unless a [`MessageBuilder::given`] guard was false or the severity is
/// below the log's minimum.
pub struct MessageBuilder<'a> {
    log: &'a MessageLog,
    severity: Severity,
    location: Option<SourceLocation>,
    message: Option<String>,
    rule: Option<String>,
    suppressed: bool,
}

impl<'a> MessageBuilder<'a> {
    fn new(log: &'a MessageLog, severity: Severity) -> Self {
        Self {
            log,
            severity,
            location: None,
            message: None,
            rule: None,
            suppressed: false,
        }
    }

    /// Sets where the message originates.
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the text of the message.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates the message with a rule.
    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Only records the message if `condition` holds.
    pub fn given(mut self, condition: bool) -> Self {
        self.suppressed |= !condition;
        self
    }
}

impl Drop for MessageBuilder<'_> {
    fn drop(&mut self) {
        if self.suppressed || self.severity < self.log.minimum_severity {
            return;
        }

        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.severity.singular().to_string());

        self.log.messages.push(Message {
            severity: self.severity,
            location: self.location.take(),
            message,
            rule: self.rule.take(),
        });
    }
}

/// Collection of messages recorded while rewriting.
///
/// This type is thread-safe: messages can be appended concurrently from multiple
/// threads using shared references (`&self`).
#[derive(Debug)]
pub struct MessageLog {
    messages: boxcar::Vec<Message>,
    minimum_severity: Severity,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MessageLog {
    fn clone(&self) -> Self {
        let new_log = Self::with_minimum_severity(self.minimum_severity);
        for (_, message) in &self.messages {
            new_log.messages.push(message.clone());
        }
        new_log
    }
}

impl MessageLog {
    /// Creates an empty log that keeps every message.
    #[must_use]
    pub fn new() -> Self {
        Self::with_minimum_severity(Severity::Trace)
    }

    /// Creates an empty log that drops messages below `minimum_severity`.
    #[must_use]
    pub fn with_minimum_severity(minimum_severity: Severity) -> Self {
        Self {
            messages: boxcar::Vec::new(),
            minimum_severity,
        }
    }

    /// The lowest severity this log keeps.
    #[must_use]
    pub fn minimum_severity(&self) -> Severity {
        self.minimum_severity
    }

    /// Returns true if no messages have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.count() == 0
    }

    /// Returns the total number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.count()
    }

    /// Starts building a new message of the given severity.
    pub fn record(&self, severity: Severity) -> MessageBuilder<'_> {
        MessageBuilder::new(self, severity)
    }

    /// Records a message, honouring the minimum severity.
    pub fn push(&self, message: Message) {
        if message.severity >= self.minimum_severity {
            self.messages.push(message);
        }
    }

    /// Records a trace message.
    pub fn trace(&self, message: impl Into<String>) {
        self.push(Message::new(Severity::Trace, message));
    }

    /// Records an informational message.
    pub fn inform(&self, message: impl Into<String>) {
        self.push(Message::new(Severity::Informational, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.push(Message::new(Severity::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.push(Message::new(Severity::Error, message));
    }

    /// Merges another log into this one, applying this log's minimum severity.
    pub fn merge_ref(&self, other: &MessageLog) {
        for (_, message) in &other.messages {
            self.push(message.clone());
        }
    }

    /// Returns an iterator over all messages.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().map(|(_, m)| m)
    }

    /// Returns an iterator over messages of exactly the given severity.
    pub fn filter_severity(&self, severity: Severity) -> impl Iterator<Item = &Message> + '_ {
        self.iter().filter(move |m| m.severity == severity)
    }

    /// Returns an iterator over messages at or above the given severity.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &Message> + '_ {
        self.iter().filter(move |m| m.severity >= severity)
    }

    /// Returns an iterator over messages reported by `rule`.
    pub fn filter_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.iter().filter(move |m| m.rule.as_deref() == Some(rule))
    }

    /// Returns an iterator over messages raised in the given member.
    pub fn filter_member<'a>(
        &'a self,
        class_name: &'a str,
        member_name: &'a str,
    ) -> impl Iterator<Item = &'a Message> + 'a {
        self.iter().filter(move |m| {
            m.location.as_ref().is_some_and(|l| {
                l.class_name == class_name && l.member_name == member_name
            })
        })
    }

    /// Returns an iterator over warnings.
    pub fn warnings(&self) -> impl Iterator<Item = &Message> + '_ {
        self.filter_severity(Severity::Warning)
    }

    /// Returns an iterator over errors.
    pub fn errors(&self) -> impl Iterator<Item = &Message> + '_ {
        self.filter_severity(Severity::Error)
    }

    /// Returns true if any error has been recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Counts messages grouped by severity.
    #[must_use]
    pub fn count_by_severity(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for message in self.iter() {
            *counts.entry(message.severity).or_insert(0) += 1;
        }
        counts
    }

    /// Counts messages grouped by reporting rule.
    #[must_use]
    pub fn count_by_rule(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for message in self.iter() {
            if let Some(rule) = &message.rule {
                *counts.entry(rule.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Generates a human-readable summary, most severe first.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no messages".to_string();
        }

        let mut counts: Vec<_> = self.count_by_severity().into_iter().collect();
        counts.sort_by(|a, b| b.0.cmp(&a.0));
        counts
            .into_iter()
            .map(|(severity, count)| {
                let noun = if count == 1 {
                    severity.singular()
                } else {
                    severity.plural()
                };
                format!("{count} {noun}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Iterator wrapper for MessageLog that yields &Message
pub struct MessageLogIter<'a> {
    inner: boxcar::Iter<'a, Message>,
}

impl<'a> Iterator for MessageLogIter<'a> {
    type Item = &'a Message;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, m)| m)
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Message;
    type IntoIter = MessageLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        MessageLogIter {
            inner: self.messages.iter(),
        }
    }
}

impl Extend<Message> for MessageLog {
    fn extend<T: IntoIterator<Item = Message>>(&mut self, iter: T) {
        for message in iter {
            self.push(message);
        }
    }
}

impl FromIterator<Message> for MessageLog {
    fn from_iter<T: IntoIterator<Item = Message>>(iter: T) -> Self {
        let log = Self::new();
        for message in iter {
            log.push(message);
        }
        log
    }
}
