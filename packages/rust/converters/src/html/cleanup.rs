//! Post-conversion cleanup for markdown produced from HTML.
//!
//! Passes run in a fixed order, each taking the previous output.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::trace;
use url::Url;

/// Inputs the passes may consult.
pub(crate) struct CleanupContext<'a> {
    /// Base for resolving relative links. `None` leaves links untouched.
    pub base_url: Option<&'a Url>,
    /// When `false`, inline base64 payloads are elided.
    pub keep_data_uris: bool,
}

type Pass = fn(&str, &CleanupContext<'_>) -> String;

const PIPELINE: &[(&str, Pass)] = &[
    ("demote_extra_h1", demote_extra_h1),
    ("strip_container_tags", strip_container_tags),
    ("code_fence_languages", code_fence_languages),
    ("resolve_links", resolve_links),
    ("elide_data_uris", elide_data_uris),
    ("tidy_whitespace", tidy_whitespace),
];

/// Run every pass over `md`.
pub(crate) fn run_pipeline(md: &str, ctx: &CleanupContext<'_>) -> String {
    PIPELINE.iter().fold(md.to_string(), |acc, (name, pass)| {
        let out = pass(&acc, ctx);
        trace!(pass = name, before = acc.len(), after = out.len(), "cleanup pass");
        out
    })
}

// ---------------------------------------------------------------------------
// Headings
// ---------------------------------------------------------------------------

/// Keep the first `# ` heading; later ones become `## `.
fn demote_extra_h1(md: &str, _ctx: &CleanupContext<'_>) -> String {
    let mut seen_h1 = false;
    map_outside_fences(md, |line| match line.strip_prefix("# ") {
        Some(rest) if seen_h1 => format!("## {rest}"),
        Some(_) => {
            seen_h1 = true;
            line.to_string()
        }
        None => line.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Leftover markup
// ---------------------------------------------------------------------------

fn strip_container_tags(md: &str, _ctx: &CleanupContext<'_>) -> String {
    static CONTAINER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|font|center)(?:\s[^>]*)?>",
        )
        .expect("valid regex")
    });

    map_outside_fences(md, |line| CONTAINER_RE.replace_all(line, "").into_owned())
}

/// `language-js`, `lang-python` and `highlight-rust` class prefixes become
/// bare fence languages.
fn code_fence_languages(md: &str, _ctx: &CleanupContext<'_>) -> String {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(\s*```)(?:language-|lang-|highlight-)([\w+#-]+)").expect("valid regex")
    });

    FENCE_RE.replace_all(md, "$1$2").into_owned()
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

fn resolve_links(md: &str, ctx: &CleanupContext<'_>) -> String {
    let Some(base) = ctx.base_url else {
        return md.to_string();
    };

    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    LINK_RE
        .replace_all(md, |caps: &Captures<'_>| {
            let (bang, text, href) = (&caps[1], &caps[2], &caps[3]);
            if !bang.is_empty() || is_absolute_or_local(href) {
                return caps[0].to_string();
            }
            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn is_absolute_or_local(href: &str) -> bool {
    href.starts_with('#') || Url::parse(href).is_ok()
}

/// `![x](data:image/png;base64,AAAA)` → `![x](data:image/png;base64...)`.
fn elide_data_uris(md: &str, ctx: &CleanupContext<'_>) -> String {
    if ctx.keep_data_uris {
        return md.to_string();
    }

    static DATA_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\]\(data:([^;)]+);base64,[^)]*\)").expect("valid regex")
    });

    DATA_URI_RE
        .replace_all(md, "](data:$1;base64...)")
        .into_owned()
}

// ---------------------------------------------------------------------------
// Whitespace
// ---------------------------------------------------------------------------

/// Trim line ends, allow at most one blank line in a row outside code
/// fences, and drop leading/trailing blank lines.
fn tidy_whitespace(md: &str, _ctx: &CleanupContext<'_>) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in md.lines() {
        let line = line.trim_end();
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence && line.is_empty() && out.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Apply `f` to every line outside fenced code blocks.
fn map_outside_fences(md: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut in_fence = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence { line.to_string() } else { f(line) }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(base: Option<&Url>, keep_data_uris: bool) -> CleanupContext<'_> {
        CleanupContext {
            base_url: base,
            keep_data_uris,
        }
    }

    #[test]
    fn second_h1_is_demoted() {
        let out = demote_extra_h1("# One\n\ntext\n\n# Two", &ctx(None, true));
        assert_eq!(out, "# One\n\ntext\n\n## Two");
    }

    #[test]
    fn fenced_code_is_left_alone() {
        let md = "```html\n<div>kept</div>\n# not a heading\n```\n<div>gone</div>";
        let out = strip_container_tags(md, &ctx(None, true));
        assert!(out.contains("<div>kept</div>"));
        assert!(out.ends_with("gone"));
    }

    #[test]
    fn fence_language_prefix_removed() {
        let out = code_fence_languages("```language-rust\nfn x() {}\n```", &ctx(None, true));
        assert!(out.starts_with("```rust\n"));
    }

    #[test]
    fn relative_links_resolve_against_base() {
        let base = Url::parse("https://docs.example.com/guide/intro").unwrap();
        let md = "[Next](../api/ref) [Abs](https://x.org/) [Top](#top) ![i](img.png)";
        let out = resolve_links(md, &ctx(Some(&base), true));
        assert!(out.contains("[Next](https://docs.example.com/api/ref)"));
        assert!(out.contains("[Abs](https://x.org/)"));
        assert!(out.contains("[Top](#top)"));
        assert!(out.contains("![i](img.png)"));
    }

    #[test]
    fn mailto_is_not_rewritten() {
        let base = Url::parse("https://example.com/").unwrap();
        let out = resolve_links("[Mail](mailto:a@b.c)", &ctx(Some(&base), true));
        assert_eq!(out, "[Mail](mailto:a@b.c)");
    }

    #[test]
    fn data_uris_elided_only_when_asked() {
        let md = "![dot](data:image/png;base64,iVBORw0KGgo=)";
        assert_eq!(elide_data_uris(md, &ctx(None, true)), md);
        assert_eq!(
            elide_data_uris(md, &ctx(None, false)),
            "![dot](data:image/png;base64...)"
        );
    }

    #[test]
    fn whitespace_is_tidied() {
        let md = "\n\nA  \n\n\n\nB\t\n\n";
        assert_eq!(tidy_whitespace(md, &ctx(None, true)), "A\n\nB");
    }

    #[test]
    fn blank_lines_inside_fences_survive() {
        let md = "```\na\n\n\nb\n```";
        assert_eq!(tidy_whitespace(md, &ctx(None, true)), md);
    }

    #[test]
    fn full_pipeline() {
        let base = Url::parse("https://example.com/docs/").unwrap();
        let md = "# T\n\n\n\n<div>body</div> [x](y.html)\n\n# Again\n\n```lang-py\nprint(1)\n```\n";
        let out = run_pipeline(md, &ctx(Some(&base), true));
        assert_eq!(
            out,
            "# T\n\nbody [x](https://example.com/docs/y.html)\n\n## Again\n\n```py\nprint(1)\n```"
        );
    }
}
