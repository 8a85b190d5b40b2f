use leptos::prelude::*;

use crate::components::live_coach::LiveCoach;

/// Live voice coaching page.
#[component]
pub fn Live() -> impl IntoView {
	view! { <LiveCoach /> }
}
