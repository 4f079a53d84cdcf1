//! Main layout: header bar with brand, theme switcher and user button.

use super::RenderContext;
use super::html::{cn, escape};
use crate::identity::AuthenticatedUser;
use crate::theme::Theme;

/// Wrap page content in the header + main column.
pub fn main_layout(ctx: &RenderContext<'_>, content: &str) -> String {
    format!(
        r#"<div class="flex min-h-screen flex-col">
    <header class="sticky top-0 z-50 w-full border-b bg-background/95 backdrop-blur supports-[backdrop-filter]:bg-background/60">
        <div class="container flex h-14 items-center">
            <div class="mr-4 flex">
                <a class="mr-6 flex items-center space-x-2" href="/">
                    <span class="hidden font-bold sm:inline-block">Auto Ledger</span>
                </a>
            </div>
            <div class="flex flex-1 items-center justify-end space-x-2">
                {switcher}
                {user_button}
            </div>
        </div>
    </header>
    <main class="flex-1 container py-6">{content}</main>
</div>"#,
        switcher = theme_switcher(ctx.theme),
        user_button = user_button(ctx),
    )
}

/// One submit button per mode; the current one is marked pressed.
fn theme_switcher(theme: Theme) -> String {
    let buttons: String = theme
        .choices()
        .into_iter()
        .map(|mode| {
            let active = mode == theme.preference;
            format!(
                r#"<button type="submit" name="mode" value="{value}" class="{class}" aria-pressed="{active}">{label}</button>"#,
                value = mode.as_str(),
                class = cn(&["theme-option", if active { "theme-option-active" } else { "" }]),
                label = mode.label(),
            )
        })
        .collect();

    format!(
        r#"<form class="theme-switcher flex items-center" method="post" action="/theme" aria-label="Theme">{buttons}</form>"#
    )
}

/// Identity widget: avatar menu when signed in, sign-in link otherwise.
pub fn user_button(ctx: &RenderContext<'_>) -> String {
    let config = ctx.identity_config;
    let Some(user) = ctx.identity.user() else {
        return format!(
            r#"<a class="user-button-sign-in" href="{}">Sign in</a>"#,
            escape(&config.sign_in_url)
        );
    };

    let account_link = config
        .account_url
        .as_deref()
        .map(|url| {
            format!(
                r#"<a class="user-menu-item" href="{}">Manage account</a>"#,
                escape(url)
            )
        })
        .unwrap_or_default();

    let email = user
        .email
        .as_deref()
        .filter(|e| *e != user.display_name())
        .map(|e| format!(r#"<p class="user-menu-email">{}</p>"#, escape(e)))
        .unwrap_or_default();

    format!(
        r#"<details class="user-button">
    <summary class="user-button-trigger" aria-label="Open user menu">{avatar}</summary>
    <div class="user-menu" role="menu">
        <p class="user-menu-name">{name}</p>
        {email}
        {account_link}
        <a class="user-menu-item" href="{sign_out}">Sign out</a>
    </div>
</details>"#,
        avatar = avatar(user),
        name = escape(user.display_name()),
        sign_out = escape(&config.sign_out_url),
    )
}

fn avatar(user: &AuthenticatedUser) -> String {
    match user.image_url.as_deref() {
        Some(src) => format!(
            r#"<img class="user-avatar" src="{}" alt="{}" width="32" height="32">"#,
            escape(src),
            escape(user.display_name())
        ),
        None => format!(
            r#"<span class="user-avatar user-avatar-initials">{}</span>"#,
            escape(&user.initials())
        ),
    }
}
