use accord_canonical::PeerId;
use tracing::warn;

use crate::consensus::Signings;
use crate::errors::CoreError;

/// Decides whether `requester` may act on `subject` given the consensus signings.
///
/// With owners, the requester must be an owner and every owner must have
/// signed. Without owners, only the subject itself may act, and it must have
/// signed.
pub fn check_permission(
    subject: &PeerId,
    owners: &[PeerId],
    signings: &Signings,
    requester: &PeerId,
) -> Result<(), CoreError> {
    let expected: Vec<&PeerId> = if owners.is_empty() {
        if requester != subject {
            return Err(CoreError::Unauthorized(format!(
                "request user {requester} cannot operate on peer {subject}"
            )));
        }
        vec![requester]
    } else {
        if !owners.contains(requester) {
            return Err(CoreError::Unauthorized(format!(
                "request user {requester} is not a peer owner"
            )));
        }
        owners.iter().collect()
    };

    if signings.is_empty() {
        return Err(CoreError::Unauthorized("no signings found".into()));
    }
    for signer in expected {
        if !signings.contains_key(signer) {
            warn!(subject = %subject, missing = %signer, "required signer absent");
            return Err(CoreError::Unauthorized(format!("{signer} has not signed")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<PeerId> {
        values.iter().map(|v| PeerId::new(*v)).collect()
    }

    fn signed_by(values: &[&str]) -> Signings {
        values
            .iter()
            .map(|v| (PeerId::new(*v), format!("sig-{v}")))
            .collect()
    }

    #[test]
    fn self_governed_subject_signs_for_itself() {
        let p = PeerId::new("p");
        assert!(check_permission(&p, &[], &signed_by(&["p"]), &p).is_ok());
        assert!(check_permission(&p, &[], &signed_by(&["q"]), &p).is_err());
        assert!(check_permission(&p, &[], &signed_by(&["p"]), &PeerId::new("q")).is_err());
    }

    #[test]
    fn owners_must_all_sign() {
        let p = PeerId::new("p");
        let owners = ids(&["x", "y"]);
        let x = PeerId::new("x");
        assert!(check_permission(&p, &owners, &signed_by(&["x", "y"]), &x).is_ok());
        assert!(matches!(
            check_permission(&p, &owners, &signed_by(&["x"]), &x),
            Err(CoreError::Unauthorized(_))
        ));
    }

    #[test]
    fn non_owner_requester_is_rejected() {
        let p = PeerId::new("p");
        let owners = ids(&["x", "y"]);
        assert!(check_permission(&p, &owners, &signed_by(&["x", "y"]), &p).is_err());
    }

    #[test]
    fn empty_signings_are_rejected() {
        let p = PeerId::new("p");
        assert!(check_permission(&p, &[], &Signings::new(), &p).is_err());
    }
}
