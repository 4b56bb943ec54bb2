//! Confirmation gate for destructive SQL.
//!
//! Each (user, chat session) scope moves through
//! `Idle -> AwaitingConfirmation -> (Executing | cancelled) -> Idle`.
//! A destructive statement is parked under a ticket and only released for
//! execution when the owning user confirms that exact ticket. The gate
//! itself never talks to a database: [`ConfirmationGate::resolve`] hands
//! back an [`ExecutionPermit`] and the caller runs the statement. Dropping
//! the permit returns the scope to `Idle`, whatever the execution outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::output::ConfirmationRequired;
use crate::preview::{preview, StatementPreview};
use crate::sql_risk::{classify, suspicious_patterns, RiskLevel};
use crate::types::{DbId, Timestamp};

/// Default lifetime of an unanswered pending statement.
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(15 * 60);

/// Key under which at most one statement may be pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GateScope {
    pub user_id: DbId,
    /// Chat session the question belongs to; `None` for ad-hoc questions.
    pub session_id: Option<DbId>,
}

impl GateScope {
    pub fn new(user_id: DbId, session_id: Option<DbId>) -> Self {
        Self {
            user_id,
            session_id,
        }
    }
}

/// A destructive statement waiting for the user's decision.
#[derive(Debug, Clone)]
pub struct PendingStatement {
    pub ticket: Uuid,
    pub scope: GateScope,
    /// Connection the statement was generated against.
    pub connection_id: Uuid,
    pub sql: String,
    pub preview: StatementPreview,
    pub warnings: Vec<String>,
    pub created_at: Timestamp,
}

impl PendingStatement {
    /// Client-facing payload for this pending statement.
    pub fn to_confirmation(&self) -> ConfirmationRequired {
        ConfirmationRequired {
            ticket: self.ticket,
            sql: self.sql.clone(),
            table: self.preview.to_table(),
            preview: self.preview.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

/// Observable state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingConfirmation,
    Executing,
}

/// What to do with a freshly generated statement.
#[derive(Debug)]
pub enum Submission {
    /// SAFE statement; run it now.
    Execute { sql: String },
    /// DESTRUCTIVE statement; parked until the user decides.
    AwaitConfirmation(ConfirmationRequired),
}

/// The user's answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Cancel,
}

impl From<bool> for Decision {
    fn from(confirm: bool) -> Self {
        if confirm {
            Self::Confirm
        } else {
            Self::Cancel
        }
    }
}

/// Outcome of [`ConfirmationGate::resolve`].
#[derive(Debug)]
pub enum Resolution {
    /// Confirmed; run the statement while holding the permit.
    Execute(ExecutionPermit),
    /// Cancelled; nothing was executed.
    Cancelled(PendingStatement),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GateError {
    /// The scope already has an unresolved statement.
    #[error("A statement is already awaiting confirmation (ticket {ticket})")]
    Busy { ticket: Uuid },

    /// Unknown, expired, already resolved, or owned by someone else.
    #[error("No pending statement for ticket {0}")]
    NotFound(Uuid),

    /// The user's active connection is no longer the one the statement
    /// was generated against; the statement has been discarded.
    #[error("The database connection changed since ticket {0} was issued")]
    ConnectionChanged(Uuid),

    /// The client echoed a statement that differs from the stored one.
    #[error("Statement does not match the one awaiting confirmation")]
    SqlMismatch,
}

#[derive(Debug)]
struct Entry {
    pending: PendingStatement,
    executing: bool,
}

#[derive(Debug, Default)]
struct GateInner {
    entries: HashMap<Uuid, Entry>,
    by_scope: HashMap<GateScope, Uuid>,
}

impl GateInner {
    fn remove(&mut self, ticket: Uuid) -> Option<Entry> {
        let entry = self.entries.remove(&ticket)?;
        if self.by_scope.get(&entry.pending.scope) == Some(&ticket) {
            self.by_scope.remove(&entry.pending.scope);
        }
        Some(entry)
    }

    fn purge_expired(&mut self, ttl: chrono::Duration, now: Timestamp) -> usize {
        let expired: Vec<Uuid> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.executing && now - e.pending.created_at >= ttl)
            .map(|(ticket, _)| *ticket)
            .collect();
        for ticket in &expired {
            self.remove(*ticket);
        }
        expired.len()
    }
}

/// Shared, cheaply cloneable confirmation gate.
#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    inner: Arc<Mutex<GateInner>>,
    ttl: chrono::Duration,
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new(DEFAULT_PENDING_TTL)
    }
}

impl ConfirmationGate {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GateInner::default())),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state of `scope`.
    pub fn state(&self, scope: &GateScope) -> GateState {
        let mut inner = self.lock();
        inner.purge_expired(self.ttl, Utc::now());
        match inner.by_scope.get(scope).and_then(|t| inner.entries.get(t)) {
            None => GateState::Idle,
            Some(e) if e.executing => GateState::Executing,
            Some(_) => GateState::AwaitingConfirmation,
        }
    }

    /// Reject early when `scope` is not idle.
    pub fn ensure_idle(&self, scope: &GateScope) -> Result<(), GateError> {
        let mut inner = self.lock();
        inner.purge_expired(self.ttl, Utc::now());
        match inner.by_scope.get(scope) {
            Some(ticket) => Err(GateError::Busy { ticket: *ticket }),
            None => Ok(()),
        }
    }

    /// Route a cleaned statement through the gate.
    pub fn submit(
        &self,
        scope: GateScope,
        connection_id: Uuid,
        sql: &str,
    ) -> Result<Submission, GateError> {
        let mut inner = self.lock();
        inner.purge_expired(self.ttl, Utc::now());
        if let Some(ticket) = inner.by_scope.get(&scope) {
            return Err(GateError::Busy { ticket: *ticket });
        }

        if classify(sql) == RiskLevel::Safe {
            return Ok(Submission::Execute {
                sql: sql.to_string(),
            });
        }

        let pending = PendingStatement {
            ticket: Uuid::new_v4(),
            scope,
            connection_id,
            sql: sql.to_string(),
            preview: preview(sql),
            warnings: suspicious_patterns(sql),
            created_at: Utc::now(),
        };
        let confirmation = pending.to_confirmation();
        inner.by_scope.insert(scope, pending.ticket);
        inner.entries.insert(
            pending.ticket,
            Entry {
                pending,
                executing: false,
            },
        );
        Ok(Submission::AwaitConfirmation(confirmation))
    }

    /// Apply the user's decision to a pending statement.
    ///
    /// `active_connection` is the user's connection at the time of the
    /// decision. `echoed_sql`, when the client sends it back, must equal the
    /// stored statement; on mismatch the pending statement is left as is.
    pub fn resolve(
        &self,
        user_id: DbId,
        ticket: Uuid,
        decision: Decision,
        active_connection: Option<Uuid>,
        echoed_sql: Option<&str>,
    ) -> Result<Resolution, GateError> {
        let mut inner = self.lock();
        inner.purge_expired(self.ttl, Utc::now());

        let entry = inner
            .entries
            .get_mut(&ticket)
            .filter(|e| e.pending.scope.user_id == user_id && !e.executing)
            .ok_or(GateError::NotFound(ticket))?;

        if let Some(sql) = echoed_sql {
            if sql.trim() != entry.pending.sql.trim() {
                return Err(GateError::SqlMismatch);
            }
        }

        match decision {
            Decision::Cancel => {
                let entry = inner.remove(ticket).ok_or(GateError::NotFound(ticket))?;
                Ok(Resolution::Cancelled(entry.pending))
            }
            Decision::Confirm => {
                if active_connection != Some(entry.pending.connection_id) {
                    inner.remove(ticket);
                    return Err(GateError::ConnectionChanged(ticket));
                }
                entry.executing = true;
                let pending = entry.pending.clone();
                drop(inner);
                Ok(Resolution::Execute(ExecutionPermit {
                    gate: self.clone(),
                    pending,
                }))
            }
        }
    }

    /// Drop every unanswered statement of `user_id`.
    ///
    /// Called when the user's connection is replaced or closed.
    pub fn discard_for_user(&self, user_id: DbId) -> usize {
        let mut inner = self.lock();
        let tickets: Vec<Uuid> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.pending.scope.user_id == user_id && !e.executing)
            .map(|(t, _)| *t)
            .collect();
        for ticket in &tickets {
            inner.remove(*ticket);
        }
        tickets.len()
    }

    /// Remove pending statements older than the TTL. Returns how many.
    pub fn purge_expired(&self) -> usize {
        self.lock().purge_expired(self.ttl, Utc::now())
    }

    /// Number of statements currently held (awaiting or executing).
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn finish(&self, ticket: Uuid) {
        self.lock().remove(ticket);
    }
}

/// Proof that a statement was confirmed. Dropping it returns the scope to
/// `Idle`.
#[derive(Debug)]
pub struct ExecutionPermit {
    gate: ConfirmationGate,
    pending: PendingStatement,
}

impl ExecutionPermit {
    pub fn pending(&self) -> &PendingStatement {
        &self.pending
    }

    pub fn sql(&self) -> &str {
        &self.pending.sql
    }
}

impl Drop for ExecutionPermit {
    fn drop(&mut self) {
        self.gate.finish(self.pending.ticket);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const DELETE_SQL: &str = "DELETE FROM users WHERE id=5";

    fn scope() -> GateScope {
        GateScope::new(1, Some(10))
    }

    fn park(gate: &ConfirmationGate, conn: Uuid) -> Uuid {
        match gate.submit(scope(), conn, DELETE_SQL).unwrap() {
            Submission::AwaitConfirmation(c) => c.ticket,
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[test]
    fn safe_statement_executes_immediately() {
        let gate = ConfirmationGate::default();
        let sub = gate.submit(scope(), Uuid::new_v4(), "SELECT * FROM orders").unwrap();
        assert_matches!(sub, Submission::Execute { sql } if sql == "SELECT * FROM orders");
        assert_eq!(gate.state(&scope()), GateState::Idle);
        assert!(gate.is_empty());
    }

    #[test]
    fn destructive_statement_is_parked_with_preview() {
        let gate = ConfirmationGate::default();
        let sub = gate.submit(scope(), Uuid::new_v4(), DELETE_SQL).unwrap();
        let confirmation = match sub {
            Submission::AwaitConfirmation(c) => c,
            other => panic!("expected confirmation, got {other:?}"),
        };
        assert_eq!(confirmation.sql, DELETE_SQL);
        assert_eq!(confirmation.preview.table, "users");
        assert_eq!(gate.state(&scope()), GateState::AwaitingConfirmation);
    }

    #[test]
    fn second_question_is_rejected_while_awaiting() {
        let gate = ConfirmationGate::default();
        let ticket = park(&gate, Uuid::new_v4());

        assert_eq!(gate.ensure_idle(&scope()), Err(GateError::Busy { ticket }));
        let err = gate.submit(scope(), Uuid::new_v4(), "SELECT 1").unwrap_err();
        assert_eq!(err, GateError::Busy { ticket });

        // Other scopes are independent.
        let other = GateScope::new(1, Some(11));
        assert!(gate.ensure_idle(&other).is_ok());
    }

    #[test]
    fn confirm_releases_permit_and_returns_to_idle() {
        let gate = ConfirmationGate::default();
        let conn = Uuid::new_v4();
        let ticket = park(&gate, conn);

        let resolution = gate
            .resolve(1, ticket, Decision::Confirm, Some(conn), Some(DELETE_SQL))
            .unwrap();
        let permit = match resolution {
            Resolution::Execute(p) => p,
            other => panic!("expected permit, got {other:?}"),
        };
        assert_eq!(permit.sql(), DELETE_SQL);
        assert_eq!(gate.state(&scope()), GateState::Executing);

        drop(permit);
        assert_eq!(gate.state(&scope()), GateState::Idle);
        assert!(gate.is_empty());
    }

    #[test]
    fn confirming_twice_is_not_found() {
        let gate = ConfirmationGate::default();
        let conn = Uuid::new_v4();
        let ticket = park(&gate, conn);

        let first = gate.resolve(1, ticket, Decision::Confirm, Some(conn), None);
        assert_matches!(first, Ok(Resolution::Execute(_)));
        drop(first);

        let second = gate.resolve(1, ticket, Decision::Confirm, Some(conn), None);
        assert_matches!(second, Err(GateError::NotFound(t)) if t == ticket);
    }

    #[test]
    fn concurrent_confirm_while_executing_is_not_found() {
        let gate = ConfirmationGate::default();
        let conn = Uuid::new_v4();
        let ticket = park(&gate, conn);

        let _permit = gate.resolve(1, ticket, Decision::Confirm, Some(conn), None).unwrap();
        let again = gate.resolve(1, ticket, Decision::Confirm, Some(conn), None);
        assert_matches!(again, Err(GateError::NotFound(_)));
    }

    #[test]
    fn cancel_discards_without_permit() {
        let gate = ConfirmationGate::default();
        let conn = Uuid::new_v4();
        let ticket = park(&gate, conn);

        let resolution = gate.resolve(1, ticket, Decision::Cancel, Some(conn), None).unwrap();
        assert_matches!(resolution, Resolution::Cancelled(p) if p.sql == DELETE_SQL);
        assert_eq!(gate.state(&scope()), GateState::Idle);

        let again = gate.resolve(1, ticket, Decision::Confirm, Some(conn), None);
        assert_matches!(again, Err(GateError::NotFound(_)));
    }

    #[test]
    fn other_users_cannot_resolve_the_ticket() {
        let gate = ConfirmationGate::default();
        let conn = Uuid::new_v4();
        let ticket = park(&gate, conn);

        let err = gate.resolve(2, ticket, Decision::Confirm, Some(conn), None).unwrap_err();
        assert_eq!(err, GateError::NotFound(ticket));
        assert_eq!(gate.state(&scope()), GateState::AwaitingConfirmation);
    }

    #[test]
    fn mismatched_sql_leaves_statement_pending() {
        let gate = ConfirmationGate::default();
        let conn = Uuid::new_v4();
        let ticket = park(&gate, conn);

        let err = gate
            .resolve(1, ticket, Decision::Confirm, Some(conn), Some("DROP TABLE users"))
            .unwrap_err();
        assert_eq!(err, GateError::SqlMismatch);
        assert_eq!(gate.state(&scope()), GateState::AwaitingConfirmation);
    }

    #[test]
    fn changed_connection_discards_statement() {
        let gate = ConfirmationGate::default();
        let ticket = park(&gate, Uuid::new_v4());

        let err = gate
            .resolve(1, ticket, Decision::Confirm, Some(Uuid::new_v4()), None)
            .unwrap_err();
        assert_eq!(err, GateError::ConnectionChanged(ticket));
        assert_eq!(gate.state(&scope()), GateState::Idle);

        let ticket = park(&gate, Uuid::new_v4());
        let err = gate.resolve(1, ticket, Decision::Confirm, None, None).unwrap_err();
        assert_eq!(err, GateError::ConnectionChanged(ticket));
    }

    #[test]
    fn discard_for_user_only_touches_that_user() {
        let gate = ConfirmationGate::default();
        park(&gate, Uuid::new_v4());
        gate.submit(GateScope::new(2, None), Uuid::new_v4(), "DROP TABLE t")
            .unwrap();

        assert_eq!(gate.discard_for_user(1), 1);
        assert_eq!(gate.state(&scope()), GateState::Idle);
        assert_eq!(
            gate.state(&GateScope::new(2, None)),
            GateState::AwaitingConfirmation
        );
    }

    #[test]
    fn expired_statements_are_treated_as_absent() {
        let gate = ConfirmationGate::new(Duration::ZERO);
        let conn = Uuid::new_v4();
        let ticket = park(&gate, conn);

        let err = gate.resolve(1, ticket, Decision::Confirm, Some(conn), None).unwrap_err();
        assert_eq!(err, GateError::NotFound(ticket));
        assert_eq!(gate.purge_expired(), 0);
        assert!(gate.is_empty());
    }

    #[test]
    fn decision_from_bool() {
        assert_eq!(Decision::from(true), Decision::Confirm);
        assert_eq!(Decision::from(false), Decision::Cancel);
    }
}
