//! Member lookup error handlers.
//!
//! When a group member cannot be resolved, the failure is passed through an
//! ordered list of handlers. The first handler that suppresses the failure
//! or declares it fatal decides; if none does, the failure is fatal.

use ldapsync_directory::DirectoryError;
use tracing::warn;

/// Outcome of handling one member lookup failure.
#[derive(Debug)]
pub enum ErrorDecision {
    /// Skip the member and keep going.
    Suppressed,
    /// Stop; the group fails with this error.
    Fatal(DirectoryError),
    /// This handler has no opinion; try the next one.
    Unhandled(DirectoryError),
}

/// Decides what to do with a failed member lookup.
pub trait MemberErrorHandler: Send + Sync {
    fn handle(&self, group_uid: &str, member_uid: &str, error: DirectoryError) -> ErrorDecision;
}

/// Suppresses members whose DN lies outside the user query's base.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemberOutOfBoundsSuppressor;

impl MemberErrorHandler for MemberOutOfBoundsSuppressor {
    fn handle(&self, group_uid: &str, member_uid: &str, error: DirectoryError) -> ErrorDecision {
        if !error.is_out_of_bounds() {
            return ErrorDecision::Unhandled(error);
        }
        warn!(
            group_uid = %group_uid,
            member_uid = %member_uid,
            error = %error,
            "Skipping group member outside of the user search base"
        );
        ErrorDecision::Suppressed
    }
}

/// Suppresses members that do not exist in the directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemberNotFoundSuppressor;

impl MemberErrorHandler for MemberNotFoundSuppressor {
    fn handle(&self, group_uid: &str, member_uid: &str, error: DirectoryError) -> ErrorDecision {
        if !error.is_not_found() {
            return ErrorDecision::Unhandled(error);
        }
        warn!(
            group_uid = %group_uid,
            member_uid = %member_uid,
            error = %error,
            "Skipping group member that could not be found"
        );
        ErrorDecision::Suppressed
    }
}

/// Ordered chain of handlers.
#[derive(Default)]
pub struct CompoundErrorHandler {
    handlers: Vec<Box<dyn MemberErrorHandler>>,
}

impl CompoundErrorHandler {
    pub fn new(handlers: Vec<Box<dyn MemberErrorHandler>>) -> Self {
        Self { handlers }
    }

    /// Install the standard suppressors selected by the tolerance flags.
    pub fn from_tolerances(tolerate_not_found: bool, tolerate_out_of_scope: bool) -> Self {
        let mut handlers: Vec<Box<dyn MemberErrorHandler>> = Vec::new();
        if tolerate_not_found {
            handlers.push(Box::new(MemberNotFoundSuppressor));
        }
        if tolerate_out_of_scope {
            handlers.push(Box::new(MemberOutOfBoundsSuppressor));
        }
        Self { handlers }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// `Ok(())` when suppressed, otherwise the error that fails the group.
    pub fn check(
        &self,
        group_uid: &str,
        member_uid: &str,
        error: DirectoryError,
    ) -> Result<(), DirectoryError> {
        match self.handle(group_uid, member_uid, error) {
            ErrorDecision::Suppressed => Ok(()),
            ErrorDecision::Fatal(e) | ErrorDecision::Unhandled(e) => Err(e),
        }
    }
}

impl MemberErrorHandler for CompoundErrorHandler {
    fn handle(&self, group_uid: &str, member_uid: &str, error: DirectoryError) -> ErrorDecision {
        let mut error = error;
        for handler in &self.handlers {
            match handler.handle(group_uid, member_uid, error) {
                ErrorDecision::Unhandled(e) => error = e,
                decided => return decided,
            }
        }
        ErrorDecision::Fatal(error)
    }
}

impl std::fmt::Debug for CompoundErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompoundErrorHandler")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
