// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `provider.rs`

#[cfg(test)]
mod tests {
    use crate::config::{Ensure, KeyResource};
    use crate::errors::{ConfigError, ConvergeError, KeygenError};
    use crate::keygen::{GeneratedKey, KeyGenerator};
    use crate::ownership::KeyOwnership;
    use crate::provider::{KeyProvider, Outcome};
    use crate::rollover::{KeygenMode, KeygenRequest};
    use crate::testing::{days, t0, KeySpec};
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    /// Records every request; succeeds with a fixed base name unless told to fail.
    #[derive(Default)]
    struct RecordingGenerator {
        requests: RefCell<Vec<KeygenRequest>>,
        fail: bool,
    }

    impl KeyGenerator for RecordingGenerator {
        fn generate(&self, request: &KeygenRequest) -> Result<GeneratedKey, KeygenError> {
            self.requests.borrow_mut().push(request.clone());
            if self.fail {
                return Err(KeygenError::Failed {
                    program: "dnssec-keygen".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "fatal".to_string(),
                });
            }
            Ok(GeneratedKey::new(
                &request.key_directory,
                "Kexample.com.+008+54321",
            ))
        }
    }

    fn resource(dir: &Path) -> KeyResource {
        KeyResource {
            name: "example.com".to_string(),
            key_directory: Some(dir.to_path_buf()),
            algorithm: Some("RSASHA256".to_string()),
            ksk: true,
            ..KeyResource::default()
        }
    }

    #[test]
    fn test_empty_directory_creates_key() {
        let dir = TempDir::new().unwrap();
        let provider = KeyProvider::new(RecordingGenerator::default());

        let report = provider.converge(&resource(dir.path()), t0()).unwrap();

        assert_eq!(report.outcome, Outcome::Created);
        assert_eq!(report.created.as_deref(), Some("Kexample.com.+008+54321"));
        assert!(!report.valid_now);
        assert_eq!(report.key_type, "KSK");
        assert_eq!(provider.generator().requests.borrow().len(), 1);
    }

    #[test]
    fn test_valid_key_is_satisfied() {
        let dir = TempDir::new().unwrap();
        KeySpec::ksk(1)
            .valid(t0() - days(30), t0() + days(335))
            .write(dir.path());
        let provider = KeyProvider::new(RecordingGenerator::default());

        let report = provider.converge(&resource(dir.path()), t0()).unwrap();

        assert_eq!(report.outcome, Outcome::Satisfied);
        assert!(report.valid_now);
        assert!(report.valid_later);
        assert_eq!(report.keys, 1);
        assert_eq!(
            report.reference_key.as_deref(),
            Some("Kexample.com.+008+00001")
        );
        assert_eq!(report.covered_until, Some(t0() + days(335)));
        assert!(provider.generator().requests.borrow().is_empty());
    }

    #[test]
    fn test_expiring_key_gets_successor() {
        let dir = TempDir::new().unwrap();
        KeySpec::ksk(1)
            .valid(t0() - days(360), t0() + days(5))
            .write(dir.path());
        let provider = KeyProvider::new(RecordingGenerator::default());

        let report = provider
            .converge(
                &KeyResource {
                    successor: true,
                    ..resource(dir.path())
                },
                t0(),
            )
            .unwrap();

        assert_eq!(report.outcome, Outcome::Created);
        let requests = provider.generator().requests.borrow();
        assert!(matches!(
            requests[0].mode,
            KeygenMode::Successor { ref predecessor, .. } if predecessor == "Kexample.com.+008+00001"
        ));
    }

    #[test]
    fn test_generation_failure_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let provider = KeyProvider::new(RecordingGenerator {
            fail: true,
            ..RecordingGenerator::default()
        });

        let report = provider.converge(&resource(dir.path()), t0()).unwrap();

        assert_eq!(report.outcome, Outcome::GenerationFailed);
        assert_eq!(report.created, None);
        assert!(report.error.is_some());
    }

    #[test]
    fn test_invalid_resource_fails_before_scanning() {
        let provider = KeyProvider::new(RecordingGenerator::default());
        let resource = KeyResource {
            ksk: false,
            active: Some("1y".into()),
            retire: Some("1w".into()),
            ..resource(Path::new("/nonexistent/keys"))
        };

        let result = provider.converge(&resource, t0());

        assert!(matches!(
            result,
            Err(ConvergeError::Config(ConfigError::RequiresKsk { attribute: "retire", .. }))
        ));
        assert!(provider.generator().requests.borrow().is_empty());
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let expired = KeySpec::ksk(1)
            .valid(t0() - days(400), t0() - days(40))
            .delete_at(t0() - days(10));
        expired.write(dir.path());
        let provider = KeyProvider::new(RecordingGenerator::default()).with_dry_run(true);

        let report = provider
            .converge(
                &KeyResource {
                    purge: true,
                    ..resource(dir.path())
                },
                t0(),
            )
            .unwrap();

        assert_eq!(report.outcome, Outcome::WouldCreate);
        assert!(report.purged.is_empty());
        assert!(report.keygen_args.contains(&"-a".to_string()));
        assert!(provider.generator().requests.borrow().is_empty());
        assert!(dir.path().join(format!("{}.key", expired.base())).exists());
    }

    #[test]
    fn test_purge_removes_expired_keys_before_deciding() {
        let dir = TempDir::new().unwrap();
        let expired = KeySpec::ksk(1)
            .valid(t0() - days(400), t0() - days(40))
            .delete_at(t0() - days(10));
        expired.write(dir.path());
        KeySpec::ksk(2)
            .valid(t0() - days(40), t0() + days(300))
            .write(dir.path());
        let provider = KeyProvider::new(RecordingGenerator::default());

        let report = provider
            .converge(
                &KeyResource {
                    purge: true,
                    ..resource(dir.path())
                },
                t0(),
            )
            .unwrap();

        assert_eq!(report.outcome, Outcome::Satisfied);
        assert_eq!(report.purged, vec![expired.base()]);
        assert_eq!(report.keys, 1);
        assert!(!dir.path().join(format!("{}.key", expired.base())).exists());
    }

    #[test]
    fn test_absent_resource_removes_matching_keys() {
        let dir = TempDir::new().unwrap();
        let ksk = KeySpec::ksk(1).valid(t0() - days(30), t0() + days(300));
        let zsk = KeySpec::zsk(2).valid(t0() - days(30), t0() + days(300));
        ksk.write(dir.path());
        zsk.write(dir.path());
        let provider = KeyProvider::new(RecordingGenerator::default());

        let report = provider
            .converge(
                &KeyResource {
                    ensure: Ensure::Absent,
                    ..resource(dir.path())
                },
                t0(),
            )
            .unwrap();

        assert_eq!(report.outcome, Outcome::Destroyed);
        assert_eq!(report.destroyed, vec![ksk.base()]);
        assert!(!dir.path().join(format!("{}.key", ksk.base())).exists());
        assert!(!dir.path().join(format!("{}.private", ksk.base())).exists());
        assert!(dir.path().join(format!("{}.key", zsk.base())).exists());
    }

    #[test]
    fn test_absent_resource_dry_run_keeps_keys() {
        let dir = TempDir::new().unwrap();
        let ksk = KeySpec::ksk(1).valid(t0() - days(30), t0() + days(300));
        ksk.write(dir.path());
        let provider = KeyProvider::new(RecordingGenerator::default()).with_dry_run(true);

        let report = provider
            .converge(
                &KeyResource {
                    ensure: Ensure::Absent,
                    ..resource(dir.path())
                },
                t0(),
            )
            .unwrap();

        assert_eq!(report.outcome, Outcome::WouldDestroy);
        assert_eq!(report.destroyed, vec![ksk.base()]);
        assert!(dir.path().join(format!("{}.key", ksk.base())).exists());
    }

    #[test]
    fn test_unknown_owner_is_a_hard_failure() {
        let dir = TempDir::new().unwrap();
        let provider = KeyProvider::new(RecordingGenerator::default()).with_ownership(Some(
            KeyOwnership::new("keyroll-no-such-user", "keyroll-no-such-group"),
        ));

        let result = provider.converge(&resource(dir.path()), t0());

        assert!(matches!(result, Err(ConvergeError::Ownership(_))));
    }

    #[test]
    fn test_ownership_is_reapplied_to_existing_keys() {
        // A valid key needs no generation, but its files are still handed over
        let dir = TempDir::new().unwrap();
        KeySpec::ksk(1)
            .valid(t0() - days(30), t0() + days(335))
            .write(dir.path());
        let provider = KeyProvider::new(RecordingGenerator::default()).with_ownership(Some(
            KeyOwnership::new("keyroll-no-such-user", "keyroll-no-such-group"),
        ));

        let result = provider.converge(&resource(dir.path()), t0());

        assert!(matches!(result, Err(ConvergeError::Ownership(_))));
        assert!(provider.generator().requests.borrow().is_empty());
    }

    #[test]
    fn test_dry_run_leaves_ownership_alone() {
        let dir = TempDir::new().unwrap();
        KeySpec::ksk(1)
            .valid(t0() - days(30), t0() + days(335))
            .write(dir.path());
        let provider = KeyProvider::new(RecordingGenerator::default())
            .with_ownership(Some(KeyOwnership::new(
                "keyroll-no-such-user",
                "keyroll-no-such-group",
            )))
            .with_dry_run(true);

        let report = provider.converge(&resource(dir.path()), t0()).unwrap();

        assert_eq!(report.outcome, Outcome::Satisfied);
    }

    #[test]
    fn test_report_display() {
        let dir = TempDir::new().unwrap();
        let provider = KeyProvider::new(RecordingGenerator::default());

        let report = provider.converge(&resource(dir.path()), t0()).unwrap();
        let text = report.to_string();

        assert!(text.starts_with("example.com (example.com KSK): created"));
        assert!(text.contains("created: Kexample.com.+008+54321"));
    }

    #[test]
    fn test_report_serializes_outcome_in_snake_case() {
        let dir = TempDir::new().unwrap();
        let provider = KeyProvider::new(RecordingGenerator {
            fail: true,
            ..RecordingGenerator::default()
        });

        let report = provider.converge(&resource(dir.path()), t0()).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["outcome"], "generation_failed");
        assert_eq!(json["key_type"], "KSK");
    }
}
