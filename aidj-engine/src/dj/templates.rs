//! Announcement text templates
//!
//! Placeholders: `{old_mood}`, `{new_mood}`, `{title}`, `{artist}`,
//! `{name}`, `{description}`. Unknown placeholders are left as written.

use aidj_common::models::{
    EventPhase, MomentKind, Mood, PhaseKind, SpecialMoment, Track, VipGuest, VipRole,
};
use rand::seq::SliceRandom;
use rand::Rng;

/// Replace `{key}` with its value for every pair
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{}}}", key), value)
    })
}

fn choose<'a, R: Rng + ?Sized>(options: &[&'a str], rng: &mut R) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

fn mood_lines(mood: Mood) -> &'static [&'static str] {
    match mood {
        Mood::Excited => &[
            "The energy is through the roof! Here's {title} by {artist}!",
            "You're on fire tonight! Let's keep it going with {title}.",
        ],
        Mood::Happy => &[
            "Love the smiles out there. This one's {title} by {artist}.",
            "Good vibes all around, so here's {title}.",
        ],
        Mood::Energetic => &[
            "Time to move! Turning it up with {title} by {artist}.",
            "Everybody on the floor, this is {title}!",
        ],
        Mood::Chill => &[
            "Let's take it down a notch with {title} by {artist}.",
            "Easing things back from {old_mood}. Relax with {title}.",
        ],
        Mood::Romantic => &[
            "Grab someone special. This is {title} by {artist}.",
            "Something for the couples: {title}.",
        ],
        Mood::Melancholic => &[
            "Here's something to lift the room: {title} by {artist}.",
            "Let's turn this around with {title}.",
        ],
        Mood::Neutral => &[
            "Coming up next, {title} by {artist}.",
            "Here's {title}.",
        ],
    }
}

/// Lines written for one particular change of mood
fn pair_lines(old: Mood, new: Mood) -> Option<&'static [&'static str]> {
    use Mood::*;
    let lines: &'static [&'static str] = match (old, new) {
        (Excited | Energetic, Chill) => &[
            "From {old_mood} to chill. Catch your breath with {title} by {artist}.",
            "Let's give those feet a rest. Here's {title}.",
        ],
        (Chill, Excited | Energetic) => &[
            "Break's over! Waking the room up with {title} by {artist}.",
            "Enough lounging, it's {new_mood} time. This is {title}!",
        ],
        (Melancholic, Happy) => &[
            "There they are, those smiles. Here's {title} to keep them coming.",
        ],
        (Neutral, Excited) => &["Now we're talking! {title} by {artist}, let's go!"],
        (Happy, Romantic) => &["Let's slow it down for the lovebirds. This is {title}."],
        (Romantic, Excited | Energetic) => &[
            "Okay lovebirds, back to the dance floor! {title} by {artist}.",
        ],
        _ => return None,
    };
    Some(lines)
}

/// Rough room energy of a mood, 1 (low) to 6 (high)
fn mood_energy(mood: Mood) -> i8 {
    match mood {
        Mood::Melancholic => 1,
        Mood::Chill | Mood::Romantic => 2,
        Mood::Neutral => 3,
        Mood::Happy => 4,
        Mood::Energetic => 5,
        Mood::Excited => 6,
    }
}

/// Lines for a large jump in room energy, up or down
fn shift_lines(old: Mood, new: Mood) -> Option<&'static [&'static str]> {
    let delta = mood_energy(new) - mood_energy(old);
    let lines: &'static [&'static str] = if delta >= 3 {
        &[
            "Turning it up from {old_mood} to {new_mood}! Here's {title} by {artist}.",
            "The room is heating up. Let's go with {title}!",
        ]
    } else if delta <= -3 {
        &[
            "Bringing the energy down after all that {old_mood}. Here's {title} by {artist}.",
            "Time to cool off a little with {title}.",
        ]
    } else {
        return None;
    };
    Some(lines)
}

/// Line spoken when a mood change triggers a new track
///
/// Looks for a set written for the exact `(old, new)` pair, then for the
/// direction of a large energy jump, then falls back to the set for the new
/// mood alone.
pub fn mood_transition<R: Rng + ?Sized>(old: Mood, new: Mood, track: &Track, rng: &mut R) -> String {
    let lines = pair_lines(old, new)
        .or_else(|| shift_lines(old, new))
        .unwrap_or_else(|| mood_lines(new));
    render(
        choose(lines, rng),
        &[
            ("old_mood", old.as_str()),
            ("new_mood", new.as_str()),
            ("title", &track.title),
            ("artist", &track.artist),
        ],
    )
}

fn role_lines(role: VipRole) -> &'static [&'static str] {
    match role {
        VipRole::Host => &["Please give it up for our host, {name}!"],
        VipRole::GuestOfHonor => &[
            "Everyone, our guest of honor {name} has arrived!",
            "Make some noise for the star of the night, {name}!",
        ],
        VipRole::Performer => &["Put your hands together for {name}!"],
        VipRole::Family => &["A warm welcome to {name}, part of the family!"],
        VipRole::Sponsor => &["Thank you to {name} for making tonight possible!"],
        VipRole::Guest => &["Welcome, {name}!", "Great to see you, {name}!"],
    }
}

/// Greeting for a recognized VIP
pub fn vip_welcome<R: Rng + ?Sized>(guest: &VipGuest, rng: &mut R) -> String {
    render(choose(role_lines(guest.role), rng), &[("name", &guest.name)])
}

/// Line spoken when a new event phase begins
pub fn phase_change(phase: &EventPhase) -> String {
    let line = match phase.phase_kind {
        PhaseKind::Arrival => "Welcome everyone, the night is just getting started.",
        PhaseKind::Cocktail => "Drinks are flowing. Enjoy the cocktail hour!",
        PhaseKind::Dinner => "Dinner is served. Enjoy your meal.",
        PhaseKind::Speeches => "Let's settle in, it's time for a few words.",
        PhaseKind::Dancing => "The dance floor is officially open!",
        PhaseKind::Finale => "We're heading into the final stretch. Make it count!",
        PhaseKind::Custom => return format!("Up next: {}.", phase.music_style),
    };
    line.to_string()
}

/// Announcement for a special moment
///
/// The moment's own template wins; otherwise a default line per kind built
/// around the description.
pub fn moment(moment: &SpecialMoment) -> String {
    let template = match &moment.announcement_template {
        Some(t) if !t.trim().is_empty() => t.as_str(),
        _ => match moment.moment_kind {
            MomentKind::Entrance => "Ladies and gentlemen, please welcome... {description}!",
            MomentKind::CakeCutting => "Gather round, it's time for the cake! {description}.",
            MomentKind::FirstDance => "Please clear the floor for the first dance. {description}.",
            MomentKind::Toast => "Raise your glasses, it's time for a toast. {description}.",
            MomentKind::Speech => "Your attention please: {description}.",
            MomentKind::Countdown => "Get ready for the countdown! {description}!",
            MomentKind::Custom => "{description}",
        },
    };
    render(template, &[("description", &moment.description)])
}
