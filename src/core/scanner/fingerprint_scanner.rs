// src/core/scanner/fingerprint_scanner.rs

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::core::models::{StackDetails, TechStackSignature};

/// Where a rule looks for its pattern.
enum Check<'a> {
    /// A specific response header's value.
    Header(&'a str, &'a Lazy<Regex>),
    /// Every header, flattened as `name: value` lines.
    AnyHeader(&'a Lazy<Regex>),
    /// The `content` of a named `<meta>` tag.
    MetaTag(&'a str, &'a Lazy<Regex>),
    /// The raw HTML.
    Body(&'a Lazy<Regex>),
    /// The `src` attribute of any `<script>` tag.
    ScriptSrc(&'a Lazy<Regex>),
}

/// One row of the detection table: if `check` matches, `label` is part of the stack.
struct StackRule<'a> {
    label: &'a str,
    check: Check<'a>,
}

static RE_NEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/_next/|__NEXT_DATA__").unwrap());
static RE_REACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"react-dom|data-reactroot|react\.(development|production)").unwrap());
static RE_VUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-v-|__VUE_|vue(\.min)?\.js").unwrap());
static RE_NUXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"__NUXT__|/_nuxt/").unwrap());
static RE_WP_PATHS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)wp-content|wp-includes").unwrap());
static RE_WP_GENERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)wordpress").unwrap());
static RE_WOOCOMMERCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)woocommerce").unwrap());
static RE_LARAVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)laravel").unwrap());
static RE_DJANGO_COOKIE: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrftoken").unwrap());
static RE_DJANGO_FORM: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrfmiddlewaretoken").unwrap());
static RE_VITE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)/@vite/|\bvite\b").unwrap());
static RE_TAILWIND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)tailwind").unwrap());
static RE_BOOTSTRAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bootstrap(\.bundle)?(\.min)?\.(css|js)").unwrap());
static RE_JQUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)jquery").unwrap());
static RE_CLOUDFLARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)cloudflare|cf-ray").unwrap());
static RE_VERCEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)vercel").unwrap());
static RE_NETLIFY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)netlify").unwrap());
static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)nginx").unwrap());
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)apache").unwrap());
static RE_PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)php").unwrap());
static RE_PHPSESSID: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHPSESSID").unwrap());
static RE_GENERATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"v0_block|rounded-lg border bg-card text-card-foreground").unwrap());

static RE_WP_THEME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"wp-content/themes/([^/"'?\s]+)/"#).unwrap());
static RE_WP_PLUGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"wp-content/plugins/([^/"'?\s]+)/"#).unwrap());

pub const GENERATED_CODE_LABEL: &str = "AI Generated Code (v0/shadcn)";
const MAX_PLUGINS: usize = 10;

/// The master list of stack rules. A label may appear more than once.
static RULES: &[StackRule] = &[
    StackRule { label: "Next.js", check: Check::Body(&RE_NEXT) },
    StackRule { label: "React", check: Check::Body(&RE_NEXT) },
    StackRule { label: "React", check: Check::Body(&RE_REACT) },
    StackRule { label: "Vue.js", check: Check::Body(&RE_VUE) },
    StackRule { label: "Nuxt.js", check: Check::Body(&RE_NUXT) },
    StackRule { label: "WordPress", check: Check::Body(&RE_WP_PATHS) },
    StackRule { label: "WordPress", check: Check::MetaTag("generator", &RE_WP_GENERATOR) },
    StackRule { label: "WooCommerce", check: Check::Body(&RE_WOOCOMMERCE) },
    StackRule { label: "Laravel", check: Check::AnyHeader(&RE_LARAVEL) },
    StackRule { label: "Django", check: Check::AnyHeader(&RE_DJANGO_COOKIE) },
    StackRule { label: "Django", check: Check::Body(&RE_DJANGO_FORM) },
    StackRule { label: "Vite", check: Check::ScriptSrc(&RE_VITE) },
    StackRule { label: "Tailwind CSS", check: Check::Body(&RE_TAILWIND) },
    StackRule { label: "Bootstrap", check: Check::Body(&RE_BOOTSTRAP) },
    StackRule { label: "jQuery", check: Check::ScriptSrc(&RE_JQUERY) },
    StackRule { label: "Cloudflare", check: Check::AnyHeader(&RE_CLOUDFLARE) },
    StackRule { label: "Vercel", check: Check::AnyHeader(&RE_VERCEL) },
    StackRule { label: "Netlify", check: Check::AnyHeader(&RE_NETLIFY) },
    StackRule { label: "Nginx", check: Check::Header("server", &RE_NGINX) },
    StackRule { label: "Apache", check: Check::Header("server", &RE_APACHE) },
    StackRule { label: "PHP", check: Check::Header("x-powered-by", &RE_PHP) },
    StackRule { label: "PHP", check: Check::AnyHeader(&RE_PHPSESSID) },
    StackRule { label: GENERATED_CODE_LABEL, check: Check::Body(&RE_GENERATED) },
];

/// Derives the technology stack signature from a rendered page and its headers.
///
/// Pure and I/O-free: every rule in the table is evaluated independently, then
/// WordPress theme/plugin names are extracted when WordPress was detected.
///
/// # Arguments
/// * `html` - The page body.
/// * `headers` - Response headers with lower-cased names.
pub fn detect_stack(html: &str, headers: &BTreeMap<String, String>) -> TechStackSignature {
    let document = Html::parse_document(html);
    let flat_headers = headers
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut technologies = BTreeSet::new();
    debug!(total_rules = %RULES.len(), "Applying stack rules.");
    for rule in RULES {
        let matched = match &rule.check {
            Check::Header(name, re) => headers.get(*name).is_some_and(|v| re.is_match(v)),
            Check::AnyHeader(re) => re.is_match(&flat_headers),
            Check::MetaTag(name, re) => check_meta_tag(&document, name, re),
            Check::Body(re) => re.is_match(html),
            Check::ScriptSrc(re) => check_script_src(&document, re),
        };
        if matched && technologies.insert(rule.label.to_string()) {
            debug!(tech = %rule.label, "Rule matched.");
        }
    }

    let mut details = StackDetails {
        generated_code: technologies.contains(GENERATED_CODE_LABEL),
        ..Default::default()
    };
    if technologies.contains("WordPress") {
        details.theme = RE_WP_THEME.captures(html).map(|c| c[1].to_string());
        let plugins: BTreeSet<String> =
            RE_WP_PLUGIN.captures_iter(html).map(|c| c[1].to_string()).collect();
        details.plugins = plugins.into_iter().take(MAX_PLUGINS).collect();
    }

    TechStackSignature { technologies, details }
}

fn check_meta_tag(doc: &Html, name: &str, re: &Regex) -> bool {
    let selector_str = format!("meta[name='{}']", name);
    Selector::parse(&selector_str)
        .ok()
        .and_then(|selector| {
            doc.select(&selector)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(|content| re.is_match(content))
        })
        .unwrap_or(false)
}

fn check_script_src(doc: &Html, re: &Regex) -> bool {
    match Selector::parse("script[src]") {
        Ok(selector) => doc
            .select(&selector)
            .filter_map(|el| el.value().attr("src"))
            .any(|src| re.is_match(src)),
        Err(_) => false,
    }
}
