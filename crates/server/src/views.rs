//! Server-rendered HTML for the end-user pages.
//!
//! Markup is built with `maud`, which escapes every interpolated value.

use maud::{html, Markup, DOCTYPE};

use lotto_core::lottery::{HIGHEST, LOWEST, MAX_PICKS, MIN_PICKS};
use lotto_core::{Round, RoundStatus, RoundSummary, TicketDetail, UserProfile};

/// Login links shown in the page header.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nav<'a> {
    pub user: Option<&'a UserProfile>,
    pub login_enabled: bool,
}

fn join<T: ToString>(numbers: &[T]) -> String {
    numbers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn layout(title: &str, nav: Nav<'_>, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " - Lotto" }
            }
            body {
                nav {
                    a href="/" { "Home" }
                    " | "
                    a href="/submit" { "Submit a ticket" }
                    @if let Some(user) = nav.user {
                        " | "
                        a href="/my-tickets" { "My tickets" }
                        " | " (user.display_name()) " ("
                        a href="/logout" { "Log out" }
                        ")"
                    } @else if nav.login_enabled {
                        " | "
                        a href="/login" { "Log in" }
                    }
                }
                main {
                    h1 { (title) }
                    (body)
                }
            }
        }
    }
    .into_string()
}

/// Landing page with the state of the most recent round.
pub fn home(nav: Nav<'_>, latest: Option<&RoundSummary>) -> String {
    let body = match latest {
        None => html! { p { "No round has been opened yet." } },
        Some(summary) => {
            let round = &summary.round;
            html! {
                @match round.status {
                    RoundStatus::Open => {
                        p {
                            "Round " code { (round.id) } " is open. "
                            (summary.ticket_count) " ticket(s) so far."
                        }
                        p { a href="/submit" { "Submit your numbers" } }
                    }
                    RoundStatus::Closed => {
                        p {
                            "Round " code { (round.id) } " is closed with "
                            (summary.ticket_count) " ticket(s)."
                        }
                    }
                }
                @if let Some(draw) = &summary.draw {
                    p { "Winning numbers: " strong class="draw" { (join(&draw.numbers)) } }
                } @else if round.status == RoundStatus::Closed {
                    p { "Results have not been published yet." }
                }
            }
        }
    };
    layout("Lotto", nav, body)
}

/// Ticket form for the open round.
pub fn submit_form(nav: Nav<'_>, round: &Round) -> String {
    let body = html! {
        p { "Round " code { (round.id) } " is accepting tickets." }
        form method="post" action="/submit" {
            p {
                label {
                    "Identity number "
                    input name="idNumber" required maxlength="20";
                }
            }
            p {
                label {
                    "Numbers "
                    input name="numbers" required placeholder="5, 12, 19, 23, 31, 40";
                }
            }
            p {
                "Pick " (MIN_PICKS) " to " (MAX_PICKS) " different numbers between "
                (LOWEST) " and " (HIGHEST) "."
            }
            p { button type="submit" { "Get my ticket" } }
        }
    };
    layout("Submit a ticket", nav, body)
}

/// A titled one-paragraph page, used for rejections and errors.
pub fn message(nav: Nav<'_>, title: &str, text: &str) -> String {
    let body = html! {
        p class="message" { (text) }
        p { a href="/" { "Back to the start page" } }
    };
    layout(title, nav, body)
}

/// Public page of a single ticket.
pub fn ticket(nav: Nav<'_>, detail: &TicketDetail) -> String {
    let body = html! {
        dl {
            dt { "Ticket" }
            dd { code { (detail.ticket.id) } }
            dt { "Round" }
            dd { code { (detail.round.id) } " (" (detail.round.status.to_string()) ")" }
            dt { "Submitted" }
            dd { (detail.ticket.created_at.format("%Y-%m-%d %H:%M UTC").to_string()) }
            dt { "Numbers" }
            dd class="numbers" { (join(&detail.ticket.numbers)) }
        }
        @if let Some(draw) = &detail.draw {
            @let matched = detail.matched_numbers();
            p { "Winning numbers: " strong class="draw" { (join(&draw.numbers)) } }
            p {
                "You matched " (matched.len()) " number(s)"
                @if matched.is_empty() { "." } @else { ": " (join(&matched)) "." }
            }
        } @else {
            p { "Results have not been published for this round yet." }
        }
    };
    layout("Your ticket", nav, body)
}

/// Tickets submitted by the logged-in user, newest first.
pub fn my_tickets(nav: Nav<'_>, tickets: &[TicketDetail]) -> String {
    let body = html! {
        @if tickets.is_empty() {
            p {
                "You have not submitted any tickets yet. "
                a href="/submit" { "Submit one" }
                "."
            }
        } @else {
            table {
                tr {
                    th { "Submitted" }
                    th { "Round" }
                    th { "Numbers" }
                    th { "Winning numbers" }
                    th { "Matched" }
                }
                @for detail in tickets {
                    tr {
                        td {
                            a href={ "/ticket/" (detail.ticket.id) } {
                                (detail.ticket.created_at.format("%Y-%m-%d %H:%M").to_string())
                            }
                        }
                        td { (detail.round.status.to_string()) }
                        td { (join(&detail.ticket.numbers)) }
                        @match &detail.draw {
                            Some(draw) => {
                                td { (join(&draw.numbers)) }
                                td { (detail.matched_numbers().len()) }
                            }
                            None => {
                                td { "-" }
                                td { "-" }
                            }
                        }
                    }
                }
            }
        }
    };
    layout("My tickets", nav, body)
}

pub fn not_found(nav: Nav<'_>) -> String {
    message(nav, "Page not found", "There is nothing at this address.")
}
