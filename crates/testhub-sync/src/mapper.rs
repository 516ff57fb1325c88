use regex::Regex;
use rusqlite::Connection;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;
use testhub_core::config::TestCasesConfig;
use testhub_core::error::{RemoteError, StateError};
use testhub_remote::RemoteSource;
use testhub_state::{commits, test_cases};
use tracing::{debug, warn};

/// Test-case names per module, in declaration order.
pub type DiscoveredCases = BTreeMap<String, Vec<String>>;

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*do_one\s+(\S+)").expect("test directive regex must compile")
});
static END_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*return\s*$").expect("end marker regex must compile"));

/// Extract declared test-case names from a test-list file.
///
/// Scanning stops at the first end-of-declarations line; duplicates keep
/// their first position.
pub fn parse_test_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for line in text.lines() {
        if END_MARKER_RE.is_match(line) {
            break;
        }
        if let Some(caps) = DIRECTIVE_RE.captures(line)
            && let Some(name) = caps.get(1)
            && seen.insert(name.as_str().to_string())
        {
            names.push(name.as_str().to_string());
        }
    }
    names
}

/// Fetch and parse the test list of every configured module at `sha`.
///
/// A module without a test list at that revision is skipped.
pub fn discover_test_cases<R: RemoteSource + ?Sized>(
    remote: &R,
    repo: &str,
    config: &TestCasesConfig,
    sha: &str,
) -> Result<DiscoveredCases, RemoteError> {
    let mut discovered = DiscoveredCases::new();
    for module in &config.modules {
        let path = config.test_list_path_for(module);
        let file = match remote.get_file_content(repo, &path, sha) {
            Ok(file) => file,
            Err(err) if err.is_not_found() => {
                warn!(module = %module, sha, path = %path, "No test list at revision; module skipped");
                continue;
            }
            Err(err) => return Err(err),
        };
        let names = parse_test_list(&file.decoded()?);
        debug!(module = %module, sha, count = names.len(), "Discovered test cases");
        discovered.insert(module.clone(), names);
    }
    Ok(discovered)
}

/// Catalog the discovered cases, create the commit's untested test-case
/// commits and record the initial scalars. Returns the commit's test-case count.
pub fn materialize_test_cases(
    conn: &Connection,
    commit_id: i64,
    discovered: &DiscoveredCases,
) -> Result<i64, StateError> {
    let mut test_case_ids = Vec::new();
    for (module, names) in discovered {
        for name in names {
            test_case_ids.push(test_cases::ensure_test_case(conn, module, name)?);
        }
    }
    test_cases::insert_test_case_commits(conn, commit_id, &test_case_ids)?;
    let count = test_cases::count_for_commit(conn, commit_id)?;
    commits::set_initial_scalars(conn, commit_id, count)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directives_until_return() {
        let text = "\
# comment line
      do_one 1M_pre_ms_to_core_he   auto
  do_one 15M_dynamo
!do_one commented_out
do_oneglued
      return
do_one after_return
";
        assert_eq!(
            parse_test_list(text),
            vec!["1M_pre_ms_to_core_he", "15M_dynamo"]
        );
    }

    #[test]
    fn return_with_arguments_is_not_an_end_marker() {
        let text = "do_one a\nreturn 1\ndo_one b\n";
        assert_eq!(parse_test_list(text), vec!["a", "b"]);
    }

    #[test]
    fn duplicate_names_are_kept_once() {
        let text = "do_one a\ndo_one b\ndo_one a\n";
        assert_eq!(parse_test_list(text), vec!["a", "b"]);
    }

    #[test]
    fn empty_file_has_no_cases() {
        assert!(parse_test_list("").is_empty());
    }
}
