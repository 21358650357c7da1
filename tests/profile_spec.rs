use std::path::Path;

use decg::error::SchemaError;
use decg::models::*;
use decg::profile::{parse_profile, ConventionalLocator, ProfileLocator};
use decg::resolver::resolve;
use speculate2::speculate;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn yaml(contents: &str) -> Result<Profile, SchemaError> {
    parse_profile(Path::new("deep-ecg-analysis-v0.0.1.yaml"), contents)
}

speculate! {
    describe "parse_profile" {
        it "reads submodule specs in document order" {
            let profile = yaml(r#"
service: deep-ecg-analysis
version: v0.0.1
submodules:
  decg-fe-monorepo:
    exclude:
      - /apps/*
      - "!/apps/sftp-monitor"
"#).expect("Failed to parse");

            assert_eq!(
                profile.submodules["decg-fe-monorepo"].exclude,
                Some(strings(&["/apps/*", "!/apps/sftp-monitor"]))
            );
            assert!(profile.submodules_listed);
        }

        it "treats a null submodule entry as a full checkout" {
            let profile = yaml("service: s\nversion: v1\nsubmodules:\n  be:\n").expect("Failed to parse");
            assert_eq!(profile.submodules["be"], SubmoduleSpec::default());
            assert!(resolve(&profile.submodules["be"]).set.is_full());
        }

        it "marks a document without submodules as unlisted" {
            let profile = yaml("service: s\nversion: v1\n").expect("Failed to parse");
            assert!(!profile.submodules_listed);
            assert!(profile.submodules.is_empty());
        }

        it "defaults options to shallow clones on an auto branch" {
            let profile = yaml("service: s\nversion: v1\noptions:\n  auto_branch: false\n")
                .expect("Failed to parse");
            assert!(profile.options.shallow_clone);
            assert!(!profile.options.auto_branch);
        }

        it "reads .json documents as JSON" {
            let profile = parse_profile(
                Path::new("s-v1.json"),
                r#"{"service": "s", "version": "v1", "submodules": {"fe": {"include": ["apps/ui"], "ref": "main"}}}"#,
            ).expect("Failed to parse");

            assert_eq!(profile.submodules["fe"].include, Some(strings(&["apps/ui"])));
            assert_eq!(profile.submodules["fe"].reference.as_deref(), Some("main"));
        }

        it "rejects unknown submodule keys" {
            let err = yaml("service: s\nversion: v1\nsubmodules:\n  fe:\n    includes: [a]\n")
                .expect_err("unknown key");
            assert!(matches!(err, SchemaError::Invalid { .. }));
        }

        it "rejects a document without a version" {
            let err = yaml("service: s\n").expect_err("missing version");
            assert!(err.to_string().contains("version"));
        }
    }

    describe "resolve" {
        it "uses include when both lists are present and reports the exclude" {
            let resolution = resolve(&SubmoduleSpec {
                include: Some(strings(&["a"])),
                exclude: Some(strings(&["b"])),
                reference: None,
            });
            assert_eq!(resolution.set, EffectivePatternSet::include_only(strings(&["a"])));
            assert_eq!(
                resolution.advisory,
                Some(Advisory::ExcludeIgnored { ignored: strings(&["b"]) })
            );
        }

        it "uses exclude alone as exclude-all-but" {
            let resolution = resolve(&SubmoduleSpec::exclude(["docs", "!docs/api"]));
            assert_eq!(resolution.set.mode, PatternMode::ExcludeAllBut);
            assert_eq!(resolution.set.patterns, strings(&["docs", "!docs/api"]));
            assert!(resolution.advisory.is_none());
        }

        it "treats empty lists as absent" {
            let resolution = resolve(&SubmoduleSpec {
                include: Some(Vec::new()),
                exclude: Some(strings(&["docs"])),
                reference: None,
            });
            assert_eq!(resolution.set, EffectivePatternSet::exclude_all_but(strings(&["docs"])));
            assert!(resolution.advisory.is_none());
        }
    }

    describe "ProfileStore" {
        before {
            let tmp = tempfile::tempdir().expect("Failed to create temp dir");
            let dir = tmp.path().join("configs/sparse-profiles");
            std::fs::create_dir_all(&dir).expect("Failed to create profiles dir");
            let locator = ConventionalLocator::new(&dir, strings(&["yaml", "yml", "json"]));
        }

        it "returns None when no profile exists" {
            let store = decg::profile::ProfileStore::new(tmp.path(), Box::new(locator));
            assert!(store.resolve("svc", "v1", None).expect("Lookup failed").is_none());
        }

        it "matches file stems exactly" {
            std::fs::write(dir.join("svc-v1.yaml"), "service: svc\nversion: v1\n").unwrap();
            std::fs::write(dir.join("svc-v10.yaml"), "service: svc\nversion: v10\n").unwrap();

            assert_eq!(locator.find("svc", "v1").unwrap(), Some(dir.join("svc-v1.yaml")));
            assert_eq!(locator.find("Svc", "v1").unwrap(), None);
        }

        it "reads an explicit profile relative to the hub root" {
            std::fs::write(tmp.path().join("custom.yaml"), "service: svc\nversion: v1\nsubmodules:\n  fe: {}\n").unwrap();
            let store = decg::profile::ProfileStore::new(tmp.path(), Box::new(locator));

            let profile = store
                .resolve("svc", "v1", Some(Path::new("custom.yaml")))
                .expect("Lookup failed")
                .expect("profile present");
            assert!(profile.submodules.contains_key("fe"));
        }

        it "fails on a missing explicit profile" {
            let store = decg::profile::ProfileStore::new(tmp.path(), Box::new(locator));
            let err = store
                .resolve("svc", "v1", Some(Path::new("missing.yaml")))
                .expect_err("missing file");
            assert!(matches!(err, SchemaError::Unreadable { .. }));
        }
    }
}
