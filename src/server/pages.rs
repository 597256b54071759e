//! HTML pages for the one-time Google Calendar setup flow

use maud::{html, Markup, DOCTYPE};

const BODY_STYLE: &str = "font-family: sans-serif; padding: 40px; max-width: 800px; margin: 0 auto;";
const PRE_STYLE: &str = "background: #f0f0f0; padding: 20px; border-radius: 8px; overflow-x: auto;";

fn page(title: &str, content: Markup) -> String {
    html! {
        (DOCTYPE)
        html {
            head { meta charset="utf-8"; title { (title) } }
            body style=(BODY_STYLE) { (content) }
        }
    }
    .into_string()
}

pub fn setup_error(message: &str) -> String {
    page("Google Calendar Setup", html! {
        h1 { "Google Calendar Setup" }
        p style="color: red;" { "Error: " (message) }
        p { "Set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET in the .env file, then restart." }
    })
}

pub fn connected(refresh_token: &str) -> String {
    page("Google Calendar Connected", html! {
        h1 style="color: green;" { "Google Calendar Connected!" }
        p { "Add this line to your " code { ".env" } " file:" }
        pre style=(PRE_STYLE) { "GOOGLE_REFRESH_TOKEN=" (refresh_token) }
        p { "Then restart the application. Calendar events will appear on the dashboard." }
    })
}

pub fn callback_error(message: &str) -> String {
    page("Google Calendar Error", html! {
        h1 style="color: red;" { "Error" }
        p { (message) }
        p { a href="/api/auth/google" { "Try again" } }
    })
}
