//! Installed package lookup through the OS package database.

use dirtbike_domain::{
    find_import_root, footprint, ImportRoot, Interpreter, NamingConvention, OsPackage,
    ResolvedPackage,
};
use indexmap::IndexMap;

use crate::effects::PackageDatabase;
use crate::error::ConvertError;

/// Resolves `requested` to the single installed OS package that provides it
/// for `interpreter`.
///
/// Every candidate name from `convention` is queried. A package provides the
/// name only when its file list holds an import root on the interpreter's
/// search path; one provider wins, several are [`ConvertError::Ambiguous`],
/// none is [`ConvertError::NotFound`].
///
/// # Errors
///
/// See above; database failures surface as [`ConvertError::QueryFailed`].
pub fn locate(
    packages: &dyn PackageDatabase,
    convention: &dyn NamingConvention,
    interpreter: &Interpreter,
    requested: &str,
) -> Result<ResolvedPackage, ConvertError> {
    let candidates = convention.candidate_names(requested, interpreter.major);
    let mut providers: IndexMap<String, (OsPackage, ImportRoot)> = IndexMap::new();
    for candidate in &candidates {
        let found = packages
            .lookup(candidate)
            .map_err(|err| ConvertError::query(&err))?;
        for package in found {
            if providers.contains_key(&package.name) {
                continue;
            }
            match find_import_root(&package.files, requested, &interpreter.search_path) {
                Some(root) => {
                    tracing::debug!(
                        candidate = %candidate,
                        package = %package.name,
                        root = %root.path().display(),
                        "candidate provides module"
                    );
                    providers.insert(package.name.clone(), (package, root));
                }
                None => tracing::debug!(
                    candidate = %candidate,
                    package = %package.name,
                    "installed but not importable by {interpreter}"
                ),
            }
        }
    }

    if providers.len() > 1 {
        return Err(ConvertError::Ambiguous {
            requested: requested.to_string(),
            providers: providers.into_keys().collect(),
        });
    }
    let Some((_, (package, root))) = providers.into_iter().next() else {
        return Err(ConvertError::NotFound {
            requested: requested.to_string(),
            candidates,
            interpreters: vec![interpreter.to_string()],
        });
    };
    let files = footprint(&package.files, &root);
    ResolvedPackage::new(requested, Some(package), files, root.clone(), interpreter.clone())
        .ok_or_else(|| ConvertError::EmptyPackage {
            requested: requested.to_string(),
            import_root: root.path().to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{interpreter, os_package, FakeDatabase};
    use dirtbike_domain::DebianConvention;
    use std::path::PathBuf;

    const DIST: &str = "/usr/lib/python3/dist-packages";

    fn py3() -> Interpreter {
        interpreter("/usr/bin/python3", 3, 11, &["/usr/lib/python3.11", DIST])
    }

    fn files(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn prefixed_candidate_resolves() {
        let db = FakeDatabase::new(vec![os_package(
            "python3-stupid",
            "1.0-1",
            files(&[
                "/usr",
                "/usr/lib/python3/dist-packages/stupid",
                "/usr/lib/python3/dist-packages/stupid/__init__.py",
                "/usr/share/doc/python3-stupid/copyright",
            ]),
        )]);
        let resolved = locate(&db, &DebianConvention, &py3(), "stupid").expect("resolved");
        assert_eq!(resolved.os_package_name(), Some("python3-stupid"));
        assert_eq!(
            resolved.installed_files(),
            files(&["/usr/lib/python3/dist-packages/stupid/__init__.py"])
        );
        assert_eq!(resolved.interpreter().major, 3);
    }

    #[test]
    fn provides_field_counts_as_a_candidate() {
        let mut yaml = os_package(
            "python3-yaml",
            "5.3.1-1",
            files(&["/usr/lib/python3/dist-packages/yaml/__init__.py"]),
        );
        yaml.provides = vec!["python3-yaml-alias".into(), "yaml".into()];
        let db = FakeDatabase::new(vec![yaml]);
        let resolved = locate(&db, &DebianConvention, &py3(), "yaml").expect("resolved");
        assert_eq!(resolved.os_package_name(), Some("python3-yaml"));
    }

    #[test]
    fn two_providers_are_ambiguous() {
        let db = FakeDatabase::new(vec![
            os_package(
                "python3-six",
                "1.16.0-2",
                files(&["/usr/lib/python3/dist-packages/six.py"]),
            ),
            os_package(
                "six",
                "1.16.0-1",
                files(&["/usr/lib/python3.11/six.py"]),
            ),
        ]);
        let err = locate(&db, &DebianConvention, &py3(), "six").expect_err("ambiguous");
        assert_eq!(
            err,
            ConvertError::Ambiguous {
                requested: "six".into(),
                providers: vec!["six".into(), "python3-six".into()],
            }
        );
    }

    #[test]
    fn other_runtime_packages_do_not_provide() {
        let db = FakeDatabase::new(vec![os_package(
            "python-six",
            "1.16.0-2",
            files(&["/usr/lib/python2.7/dist-packages/six.py"]),
        )]);
        match locate(&db, &DebianConvention, &py3(), "six") {
            Err(ConvertError::NotFound {
                candidates,
                interpreters,
                ..
            }) => {
                assert_eq!(candidates, vec!["six", "python3-six", "python-six"]);
                assert_eq!(interpreters, vec!["python3.11 (/usr/bin/python3)"]);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
