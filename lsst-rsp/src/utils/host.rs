use std::env;
use tracing::debug;

/// Environment variables holding the image reference the Lab was spawned from, in lookup order.
const IMAGE_REFERENCE_ENV_VARS: [&str; 2] = ["JUPYTER_IMAGE_SPEC", "IMAGE_ID"];

/// Returns `HOSTNAME`, the kernel hostname, or `localhost`, whichever is found first.
pub fn get_hostname() -> String {
    env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            nix::unistd::gethostname()
                .ok()
                .and_then(|h| h.into_string().ok())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// Returns the digest of the running image, or an empty string if it cannot be determined.
pub fn get_digest() -> String {
    IMAGE_REFERENCE_ENV_VARS
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|reference| !reference.is_empty())
        .map(|reference| digest_from_reference(&reference))
        .unwrap_or_else(|| {
            debug!("no image reference available");
            String::new()
        })
}

/// Extracts the hash from a reference like `host/owner/repo@sha256:hash`.
pub fn digest_from_reference(reference: &str) -> String {
    let pinned = reference.rsplit('@').next().unwrap_or(reference);
    pinned.rsplit(':').next().unwrap_or(pinned).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serial_test::serial;

    #[rstest]
    #[case::pinned(
        "docker.io/lsstsqre/sciplat-lab@sha256:0123abcd",
        "0123abcd"
    )]
    #[case::pinned_with_tag(
        "ghcr.io/lsst-sqre/sciplat-lab:w_2025_01@sha256:feed",
        "feed"
    )]
    #[case::tag_only("ghcr.io/lsst-sqre/sciplat-lab:w_2025_01", "w_2025_01")]
    #[case::bare("feed", "feed")]
    fn extracts_digest(#[case] reference: &str, #[case] expected: &str) {
        assert_eq!(digest_from_reference(reference), expected);
    }

    #[test]
    #[serial]
    fn digest_from_environment() {
        unsafe {
            env::remove_var("IMAGE_ID");
            env::set_var("JUPYTER_IMAGE_SPEC", "repo@sha256:beef");
        }
        assert_eq!(get_digest(), "beef");
        unsafe {
            env::remove_var("JUPYTER_IMAGE_SPEC");
        }
        assert_eq!(get_digest(), "");
    }

    #[test]
    #[serial]
    fn hostname_prefers_environment() {
        let previous = env::var("HOSTNAME").ok();
        unsafe {
            env::set_var("HOSTNAME", "nb-someuser");
        }
        assert_eq!(get_hostname(), "nb-someuser");
        unsafe {
            env::remove_var("HOSTNAME");
        }
        assert!(!get_hostname().is_empty());
        if let Some(previous) = previous {
            unsafe {
                env::set_var("HOSTNAME", previous);
            }
        }
    }
}
