//! Contribution filtering API for selective listing.

use accord_canonical::PeerId;
use accord_core::Contribution;

/// Trait for filtering contributions during listing.
pub trait ContributionFilter {
    /// Returns true if the contribution matches the filter criteria.
    fn matches(&self, contribution: &Contribution) -> bool;

    /// Keeps only matching contributions.
    fn apply(&self, contributions: Vec<Contribution>) -> Vec<Contribution> {
        contributions
            .into_iter()
            .filter(|c| self.matches(c))
            .collect()
    }
}

/// Filter by signer.
#[derive(Debug, Clone)]
pub struct SignerFilter {
    /// Signer key id to match.
    pub signer_key_id: PeerId,
}

impl ContributionFilter for SignerFilter {
    fn matches(&self, contribution: &Contribution) -> bool {
        contribution.signer_key_id == self.signer_key_id
    }
}

/// Filter by the `latest` flag.
#[derive(Debug, Clone)]
pub struct LatestFilter {
    /// Required flag value.
    pub latest: bool,
}

impl ContributionFilter for LatestFilter {
    fn matches(&self, contribution: &Contribution) -> bool {
        contribution.latest == self.latest
    }
}

/// Composite filter: all filters must match (AND). Empty matches everything.
#[derive(Default)]
pub struct AndFilter {
    /// Filters to combine with AND logic.
    pub filters: Vec<Box<dyn ContributionFilter + Send + Sync>>,
}

impl AndFilter {
    /// Adds a filter.
    pub fn with(mut self, filter: impl ContributionFilter + Send + Sync + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl ContributionFilter for AndFilter {
    fn matches(&self, contribution: &Contribution) -> bool {
        self.filters.iter().all(|f| f.matches(contribution))
    }
}
