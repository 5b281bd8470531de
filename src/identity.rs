// src/identity.rs
//! Article identity: a stable id derived from the article URL only.

/// MD5 of the URL bytes, lowercase hex (32 chars).
///
/// Title or content edits never change the id; two entries pointing at the
/// same URL are the same article.
pub fn article_id(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_url_same_id() {
        let u = "https://example.com/posts/42";
        assert_eq!(article_id(u), article_id(u));
    }

    #[test]
    fn different_urls_differ() {
        assert_ne!(
            article_id("https://example.com/a"),
            article_id("https://example.com/a/")
        );
    }

    #[test]
    fn known_digest_and_shape() {
        // md5("") is a well-known constant
        assert_eq!(article_id(""), "d41d8cd98f00b204e9800998ecf8427e");
        let id = article_id("https://example.com");
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
