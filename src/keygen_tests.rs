// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `keygen.rs`

#[cfg(test)]
mod tests {
    use crate::algorithm::Algorithm;
    use crate::errors::KeygenError;
    use crate::keygen::{parse_keygen_output, DnssecKeygen, GeneratedKey, KeyGenerator};
    use crate::rollover::{KeygenMode, KeygenRequest, TimeOffset};
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    fn request(key_directory: &Path) -> KeygenRequest {
        KeygenRequest {
            key_directory: key_directory.to_path_buf(),
            zone: "example.com".to_string(),
            mode: KeygenMode::Fresh {
                algorithm: Algorithm::EcdsaP256Sha256,
                bits: None,
                nsec3: false,
                ksk: true,
                publish: TimeOffset::Now,
                activate: TimeOffset::Now,
            },
            revoke: None,
            inactivate: None,
            delete: None,
        }
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-keygen");
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "#!/bin/sh").unwrap();
            file.write_all(body.as_bytes()).unwrap();
            file.sync_all().unwrap();
        }
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_parse_keygen_output() {
        assert_eq!(
            parse_keygen_output("Kexample.com.+013+12345\n"),
            Some("Kexample.com.+013+12345".to_string())
        );
        assert_eq!(
            parse_keygen_output("Generating key pair.\nKexample.com.+013+12345\n\n"),
            Some("Kexample.com.+013+12345".to_string())
        );
        assert_eq!(parse_keygen_output(""), None);
        assert_eq!(parse_keygen_output("\n  \n"), None);
    }

    #[test]
    fn test_generated_key_paths() {
        let key = GeneratedKey::new(Path::new("/keys"), "Kexample.com.+013+12345");
        assert_eq!(
            key.public_path,
            Path::new("/keys/Kexample.com.+013+12345.key")
        );
        assert_eq!(
            key.private_path,
            Path::new("/keys/Kexample.com.+013+12345.private")
        );
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let keygen = DnssecKeygen::new(
            dir.path().join("no-such-keygen"),
            Duration::from_secs(5),
        );

        let result = keygen.generate(&request(dir.path()));
        assert!(matches!(result, Err(KeygenError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_run_returns_printed_base() {
        let dir = TempDir::new().unwrap();
        let program = script(
            dir.path(),
            "touch \"$3/Kexample.com.+013+12345.key\" \"$3/Kexample.com.+013+12345.private\"\n\
             echo Kexample.com.+013+12345\n",
        );
        let keygen = DnssecKeygen::new(program, Duration::from_secs(10));

        let key = keygen.generate(&request(dir.path())).unwrap();

        assert_eq!(key.base, "Kexample.com.+013+12345");
        assert!(key.public_path.exists());
        assert!(key.private_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_empty_output_is_an_error() {
        let dir = TempDir::new().unwrap();
        let program = script(dir.path(), "exit 0\n");
        let keygen = DnssecKeygen::new(program, Duration::from_secs(10));

        let result = keygen.generate(&request(dir.path()));
        assert!(matches!(result, Err(KeygenError::EmptyOutput { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_run_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let program = script(dir.path(), "echo 'fatal: unknown algorithm' >&2\nexit 1\n");
        let keygen = DnssecKeygen::new(program, Duration::from_secs(10));

        match keygen.generate(&request(dir.path())) {
            Err(KeygenError::Failed { stderr, .. }) => {
                assert_eq!(stderr, "fatal: unknown algorithm");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_run_times_out() {
        let dir = TempDir::new().unwrap();
        let program = script(dir.path(), "sleep 10\n");
        let keygen = DnssecKeygen::new(program, Duration::from_millis(200));

        let started = std::time::Instant::now();
        let result = keygen.generate(&request(dir.path()));

        assert!(matches!(result, Err(KeygenError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_from_blocking_task() {
        let dir = TempDir::new().unwrap();
        let program = script(dir.path(), "echo Kexample.com.+013+12345\n");
        let keygen = DnssecKeygen::new(program, Duration::from_secs(10));
        let request = request(dir.path());

        let key = tokio::task::spawn_blocking(move || keygen.generate(&request))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(key.base, "Kexample.com.+013+12345");
    }
}
