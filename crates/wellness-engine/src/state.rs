//! In-memory state the engine serves reads from.

use domain_sync::{Domain, DomainResult, DomainUpdate, HealthSnapshot};
use progression::ProgressionState;
use remote_store::Document;

/// Health domains plus gamification for the signed-in user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalState {
    pub health: HealthSnapshot,
    pub progression: ProgressionState,
}

impl LocalState {
    /// Replace one domain with a stored document.
    ///
    /// Gamification documents replace the fields they carry and keep the
    /// rest. Returns whether the domain is held locally.
    pub fn apply_document(&mut self, domain: Domain, doc: Document) -> DomainResult<bool> {
        match DomainUpdate::from_document(domain, doc)? {
            DomainUpdate::Gamification(patch) => {
                patch.apply_to(&mut self.progression);
                self.progression.ensure_catalog();
                Ok(true)
            }
            update => Ok(self.health.apply(update)),
        }
    }

    /// The stored form of one domain.
    pub fn document(&self, domain: Domain) -> DomainResult<Option<Document>> {
        let update = match domain {
            Domain::Gamification => DomainUpdate::Gamification(
                domain_sync::GamificationPatch::full(&self.progression),
            ),
            Domain::QuotaUsage => return Ok(None),
            _ => match self
                .health
                .updates()
                .into_iter()
                .find(|update| update.domain() == domain)
            {
                Some(update) => update,
                None => return Ok(None),
            },
        };
        update.to_document().map(Some)
    }
}
