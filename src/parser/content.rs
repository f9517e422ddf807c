//! Pre-conversion rewrites of Note Station HTML.
//!
//! pandoc does not understand the editor's proprietary markup, so image
//! objects and video embeds are reduced to plain HTML first. Both passes are
//! independent and always applied.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Editor class marking an embedded image object.
const IMAGE_OBJECT_CLASS: &str = "syno-notestation-image-object";

static IMG_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("valid regex"));

static IMAGE_OBJECT_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)\bclass\s*=\s*"[^"]*\b{}\b"#,
        regex::escape(IMAGE_OBJECT_CLASS)
    ))
    .expect("valid regex")
});

static REF_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bref\s*=\s*"([^"]*)""#).expect("valid regex"));

static YOUTUBE_EMBED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<(?:iframe|embed)\b[^>]*?\bsrc\s*=\s*"(?:https?:)?//(?:www\.)?youtube(?:-nocookie)?\.com/(?:embed|v)/([A-Za-z0-9_-]+)[^"]*"[^>]*>(?:\s*</(?:iframe|embed)>)?"#,
    )
    .expect("valid regex")
});

/// Apply all rewrites to raw note HTML.
pub fn rewrite_content(html: &str) -> String {
    let html = rewrite_image_objects(html);
    rewrite_video_embeds(&html)
}

/// `<img class="… syno-notestation-image-object …" … ref="TOKEN">` → `<img src="TOKEN">`.
///
/// The token survives conversion as the image target and is later replaced
/// by the attachment link.
pub fn rewrite_image_objects(html: &str) -> String {
    IMG_TAG_RE
        .replace_all(html, |caps: &Captures| {
            let tag = &caps[0];
            if !IMAGE_OBJECT_CLASS_RE.is_match(tag) {
                return tag.to_string();
            }
            match REF_ATTR_RE.captures(tag) {
                Some(r) => format!(r#"<img src="{}">"#, &r[1]),
                None => tag.to_string(),
            }
        })
        .into_owned()
}

/// YouTube iframes/embeds → a thumbnail image linking to the watch page.
pub fn rewrite_video_embeds(html: &str) -> String {
    YOUTUBE_EMBED_RE
        .replace_all(
            html,
            r#"<a href="https://www.youtube.com/watch?v=${1}"><img src="https://img.youtube.com/vi/${1}/0.jpg"></a>"#,
        )
        .into_owned()
}
