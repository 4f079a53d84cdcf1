//! Page bodies.

use super::RenderContext;
use super::document::SITE_TITLE;
use super::html::escape;

/// Default route.
pub fn home(ctx: &RenderContext<'_>) -> String {
    let greeting = match ctx.identity.user() {
        Some(user) => format!(
            r#"<p class="text-muted">Welcome back, {}.</p>"#,
            escape(user.display_name())
        ),
        None => r#"<p class="text-muted">Sign in to start tracking your fill-ups and mileage.</p>"#
            .to_string(),
    };

    format!(
        r#"<section class="space-y-4">
    <h1 class="text-3xl font-bold">Auto-Ledger Frontend</h1>
    {greeting}
</section>"#
    )
}

/// Body of the 404 page.
pub fn not_found_content() -> &'static str {
    r#"<div class="flex flex-col items-center justify-center py-20">
    <h1 class="text-4xl font-bold mb-4">404</h1>
    <p class="text-muted mb-6">Page not found</p>
    <a href="/">Go Home</a>
</div>"#
}

/// Standalone 404 document, used where no request context is available.
pub fn not_found() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Not Found - {SITE_TITLE}</title>
    <link rel="stylesheet" href="/static/app.css">
</head>
<body class="min-h-screen bg-background font-sans antialiased">
{}
</body>
</html>
"#,
        not_found_content()
    )
}
