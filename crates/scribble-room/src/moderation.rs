//! The moderation store: bans, reports, appeals and an audit trail.
//!
//! Bans are keyed by player identity and outlive the room that issued
//! them, so the store is process-wide. [`Moderation`] is a cheap-clone
//! handle shared by the registry and every room actor. The inner
//! `std::sync::Mutex` is only held for short synchronous sections, never
//! across an `.await`.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use scribble_protocol::{AppealVerdict, BanNotice, EvidenceTag, PlayerId, RoomCode};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Entries kept in the audit log; older ones are dropped.
const AUDIT_CAPACITY: usize = 1_000;

// ---------------------------------------------------------------------------
// Bans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssuedBy {
    Host,
    AntiCheat,
    Admin,
}

/// One ban-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanEntry {
    pub id: String,
    pub player_id: PlayerId,
    pub player_name: String,
    pub reason: String,
    pub issued_by: IssuedBy,
    pub issued_at: DateTime<Utc>,
    /// `None` for a permanent ban.
    pub expires_at: Option<DateTime<Utc>>,
    /// Anti-cheat tags behind the ban. Empty for manual bans.
    pub evidence: BTreeSet<EvidenceTag>,
    /// Warnings the player had collected before the ban.
    pub prior_warnings: u32,
}

impl BanEntry {
    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expiry| expiry > now)
    }

    /// The broadcast form of this ban.
    pub fn notice(&self) -> BanNotice {
        BanNotice {
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            reason: self.reason.clone(),
            evidence: self.evidence.clone(),
            expires_at: self.expires_at.map(|t| t.timestamp_millis()),
            appealable: !self.is_permanent(),
        }
    }
}

/// Input for [`Moderation::ban`].
#[derive(Debug, Clone)]
pub struct NewBan {
    pub player_id: PlayerId,
    pub player_name: String,
    pub reason: String,
    pub issued_by: IssuedBy,
    /// `None` for a permanent ban.
    pub duration_secs: Option<u64>,
    pub evidence: BTreeSet<EvidenceTag>,
    pub prior_warnings: u32,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

/// A player report, stored for moderator review. Never auto-actioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub reporter_id: PlayerId,
    pub reporter_name: String,
    pub reported_id: PlayerId,
    pub reported_name: String,
    pub room: RoomCode,
    pub reason: String,
    pub details: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for [`Moderation::file_report`].
#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter_id: PlayerId,
    pub reporter_name: String,
    pub reported_id: PlayerId,
    pub reported_name: String,
    pub room: RoomCode,
    pub reason: String,
    pub details: String,
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    /// Short action name: `ban`, `lift`, `appeal`, `report`, `reportStatus`.
    pub action: String,
    pub detail: String,
}

// ---------------------------------------------------------------------------
// Appeals
// ---------------------------------------------------------------------------

/// Tunables of the contestation rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppealPolicy {
    /// Most prior warnings a rate-only ban may carry and still be lifted.
    pub max_prior_warnings: u32,
}

impl Default for AppealPolicy {
    fn default() -> Self {
        Self {
            max_prior_warnings: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppealDecision {
    pub verdict: AppealVerdict,
    pub rationale: String,
    pub evidence: Vec<EvidenceTag>,
}

/// Decides a contestation from the recorded evidence alone.
///
/// Rules, first match wins:
///
/// 1. exactly `{USERSCRIPT_DETECTED}`: upheld
/// 2. any hard tag: upheld
/// 3. no evidence at all: referred to a human
/// 4. soft tags only, few prior warnings: overturned
/// 5. soft tags only, repeated after warnings: upheld
pub fn adjudicate(
    evidence: &BTreeSet<EvidenceTag>,
    prior_warnings: u32,
    policy: &AppealPolicy,
) -> AppealDecision {
    let listed: Vec<EvidenceTag> = evidence.iter().copied().collect();
    let (verdict, rationale) = if listed == [EvidenceTag::UserscriptDetected] {
        (
            AppealVerdict::Upheld,
            "A script-injection tool was detected in your client. This is never overturned on appeal.".to_string(),
        )
    } else if let Some(hard) = listed.iter().find(|tag| tag.is_hard()) {
        (
            AppealVerdict::Upheld,
            format!("The ban rests on direct evidence ({hard}), not only on message rate."),
        )
    } else if listed.is_empty() {
        (
            AppealVerdict::Referred,
            "No automated evidence was recorded for this ban. A moderator will review it.".to_string(),
        )
    } else if prior_warnings <= policy.max_prior_warnings {
        (
            AppealVerdict::Overturned,
            "The ban rests only on rate-based signals with a short warning history. It has been lifted.".to_string(),
        )
    } else {
        (
            AppealVerdict::Upheld,
            format!("Rate-based signals continued after {prior_warnings} prior warnings."),
        )
    };
    AppealDecision {
        verdict,
        rationale,
        evidence: listed,
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModerationError {
    #[error("player {0} has no active ban")]
    NoActiveBan(PlayerId),

    #[error("ban {0} not found")]
    BanNotFound(String),

    #[error("report {0} not found")]
    ReportNotFound(String),
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ModerationStore {
    bans: Vec<BanEntry>,
    reports: Vec<Report>,
    audit: VecDeque<AuditEntry>,
    policy: AppealPolicy,
}

impl ModerationStore {
    fn prune_expired(&mut self, now: DateTime<Utc>) {
        self.bans.retain(|ban| ban.is_active_at(now));
    }

    fn record(&mut self, action: &str, detail: String) {
        if self.audit.len() == AUDIT_CAPACITY {
            self.audit.pop_front();
        }
        self.audit.push_back(AuditEntry {
            at: Utc::now(),
            action: action.to_string(),
            detail,
        });
    }
}

/// Shared handle to the process-wide moderation store.
#[derive(Debug, Clone, Default)]
pub struct Moderation {
    inner: Arc<Mutex<ModerationStore>>,
}

impl Moderation {
    pub fn new(policy: AppealPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ModerationStore {
                policy,
                ..ModerationStore::default()
            })),
        }
    }

    // Poisoning is recovered: every write is a single push or remove.
    fn lock(&self) -> MutexGuard<'_, ModerationStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a ban. Replaces any earlier ban of the same player.
    pub fn ban(&self, new: NewBan) -> BanEntry {
        let now = Utc::now();
        let expires_at = new
            .duration_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| now.checked_add_signed(delta));
        let entry = BanEntry {
            id: Ulid::new().to_string(),
            player_id: new.player_id,
            player_name: new.player_name,
            reason: new.reason,
            issued_by: new.issued_by,
            issued_at: now,
            expires_at,
            evidence: new.evidence,
            prior_warnings: new.prior_warnings,
        };

        let mut store = self.lock();
        store.bans.retain(|ban| ban.player_id != entry.player_id);
        store.bans.push(entry.clone());
        store.record(
            "ban",
            format!(
                "{} ({}) by {:?}: {}",
                entry.player_name, entry.player_id, entry.issued_by, entry.reason
            ),
        );
        tracing::info!(
            player_id = %entry.player_id,
            issued_by = ?entry.issued_by,
            evidence = ?entry.evidence,
            "ban recorded"
        );
        entry
    }

    /// The player's active ban, if any.
    pub fn active_ban(&self, player_id: &PlayerId) -> Option<BanEntry> {
        let mut store = self.lock();
        store.prune_expired(Utc::now());
        store
            .bans
            .iter()
            .find(|ban| &ban.player_id == player_id)
            .cloned()
    }

    pub fn is_banned(&self, player_id: &PlayerId) -> bool {
        self.active_ban(player_id).is_some()
    }

    /// Every active ban.
    pub fn bans(&self) -> Vec<BanEntry> {
        let mut store = self.lock();
        store.prune_expired(Utc::now());
        store.bans.clone()
    }

    /// Lifts a ban by id.
    ///
    /// # Errors
    /// [`ModerationError::BanNotFound`] if no such (active) ban exists.
    pub fn lift(&self, ban_id: &str) -> Result<BanEntry, ModerationError> {
        let mut store = self.lock();
        let index = store
            .bans
            .iter()
            .position(|ban| ban.id == ban_id)
            .ok_or_else(|| ModerationError::BanNotFound(ban_id.to_string()))?;
        let entry = store.bans.remove(index);
        store.record("lift", format!("{} ({})", entry.player_name, entry.player_id));
        tracing::info!(player_id = %entry.player_id, "ban lifted");
        Ok(entry)
    }

    /// Contests the player's active ban. An overturned ban is lifted.
    ///
    /// # Errors
    /// [`ModerationError::NoActiveBan`] if there is nothing to contest.
    pub fn contest(&self, player_id: &PlayerId) -> Result<AppealDecision, ModerationError> {
        let mut store = self.lock();
        store.prune_expired(Utc::now());
        let index = store
            .bans
            .iter()
            .position(|ban| &ban.player_id == player_id)
            .ok_or_else(|| ModerationError::NoActiveBan(player_id.clone()))?;

        let ban = &store.bans[index];
        let decision = adjudicate(&ban.evidence, ban.prior_warnings, &store.policy);
        if decision.verdict == AppealVerdict::Overturned {
            store.bans.remove(index);
        }
        store.record("appeal", format!("{player_id}: {:?}", decision.verdict));
        tracing::info!(%player_id, verdict = ?decision.verdict, "appeal adjudicated");
        Ok(decision)
    }

    pub fn file_report(&self, new: NewReport) -> Report {
        let report = Report {
            id: Ulid::new().to_string(),
            reporter_id: new.reporter_id,
            reporter_name: new.reporter_name,
            reported_id: new.reported_id,
            reported_name: new.reported_name,
            room: new.room,
            reason: new.reason,
            details: new.details,
            status: ReportStatus::Pending,
            created_at: Utc::now(),
        };
        let mut store = self.lock();
        store.reports.push(report.clone());
        store.record(
            "report",
            format!(
                "{} reported {} in {}: {}",
                report.reporter_name, report.reported_name, report.room, report.reason
            ),
        );
        tracing::info!(room = %report.room, reported = %report.reported_id, "report filed");
        report
    }

    pub fn reports(&self) -> Vec<Report> {
        self.lock().reports.clone()
    }

    /// Moves a report to a new status.
    ///
    /// # Errors
    /// [`ModerationError::ReportNotFound`] for an unknown id.
    pub fn set_report_status(
        &self,
        report_id: &str,
        status: ReportStatus,
    ) -> Result<Report, ModerationError> {
        let mut store = self.lock();
        let report = store
            .reports
            .iter_mut()
            .find(|report| report.id == report_id)
            .ok_or_else(|| ModerationError::ReportNotFound(report_id.to_string()))?;
        report.status = status;
        let updated = report.clone();
        store.record("reportStatus", format!("{report_id}: {status:?}"));
        Ok(updated)
    }

    /// The audit trail, oldest first.
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.lock().audit.iter().cloned().collect()
    }
}
