//! Root layout: the HTML document around every page.

use super::RenderContext;
use super::html::escape;
use crate::theme::ThemeMode;

pub const SITE_TITLE: &str = "Auto Ledger";
pub const SITE_DESCRIPTION: &str = "Advanced Car Mileage Tracking";

const BODY_CLASS: &str = "min-h-screen bg-background font-sans antialiased";

/// Applies `dark` before first paint when the preference is `system`.
const SYSTEM_THEME_SCRIPT: &str = "(function(){try{var m=window.matchMedia('(prefers-color-scheme: dark)');\
var r=document.documentElement;r.classList.toggle('dark',m.matches);\
m.addEventListener('change',function(e){r.classList.toggle('dark',e.matches);});}catch(_){}})();";

/// Render the full document. `title` is prefixed to the site title.
pub fn root_layout(ctx: &RenderContext<'_>, title: Option<&str>, body: &str) -> String {
    let full_title = match title {
        Some(t) if !t.is_empty() => format!("{} - {SITE_TITLE}", escape(t)),
        _ => SITE_TITLE.to_string(),
    };

    let mut html_attrs = format!(
        r#"lang="en" data-theme-preference="{}""#,
        ctx.theme.preference
    );
    if let Some(class) = ctx.theme.html_class() {
        html_attrs.push_str(&format!(r#" class="{class}""#));
    }
    if ctx.theme.disable_transition_on_change {
        html_attrs.push_str(" data-disable-transitions");
    }

    let system_script = if ctx.theme.preference == ThemeMode::System {
        format!("\n    <script>{SYSTEM_THEME_SCRIPT}</script>")
    } else {
        String::new()
    };

    let mut body_attrs = format!(r#"class="{BODY_CLASS}""#);
    if let Some(key) = ctx.identity_config.publishable_key.as_deref() {
        body_attrs.push_str(&format!(
            r#" data-identity-publishable-key="{}""#,
            escape(key)
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html {html_attrs}>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="description" content="{SITE_DESCRIPTION}">
    <title>{full_title}</title>{system_script}
    <link rel="stylesheet" href="/static/app.css">
</head>
<body {body_attrs}>
{body}
</body>
</html>
"#
    )
}
