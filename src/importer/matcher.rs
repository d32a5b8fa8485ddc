//! Pairs local fixtures with provider fixtures by team identity.
//!
//! One precedence order serves both importers: provider id, then full name,
//! then short name. Home is only compared with home and away with away.

/// How a local team was recognised on the provider side. Lower is stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchRank {
    ExternalId = 0,
    Name = 1,
    ShortName = 2,
}

/// Local identity of a team.
#[derive(Debug, Clone, Copy)]
pub struct TeamKeys<'a> {
    pub external_id: Option<&'a str>,
    pub name: &'a str,
    pub short_name: &'a str,
}

/// A team as a provider spells it.
#[derive(Debug, Clone, Copy)]
pub struct ProviderTeam<'a> {
    pub name: &'a str,
    pub short_name: Option<&'a str>,
}

/// A provider record with a home and an away team.
pub trait ProviderFixture {
    fn home(&self) -> ProviderTeam<'_>;
    fn away(&self) -> ProviderTeam<'_>;
}

fn same(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && a == b
}

/// Strongest rule under which `local` and `provider` are the same team.
pub fn rank(local: &TeamKeys<'_>, provider: &ProviderTeam<'_>) -> Option<MatchRank> {
    if local.external_id.is_some_and(|id| same(id, provider.name)) {
        return Some(MatchRank::ExternalId);
    }
    if same(local.name, provider.name) {
        return Some(MatchRank::Name);
    }
    let provider_short = provider.short_name.unwrap_or(provider.name);
    if same(local.short_name, provider_short) {
        return Some(MatchRank::ShortName);
    }
    None
}

/// The candidate whose home and away teams both match, preferring the
/// strongest combined ranks. Ties keep provider order.
pub fn find_fixture<'c, F: ProviderFixture>(
    home: &TeamKeys<'_>,
    away: &TeamKeys<'_>,
    candidates: &'c [F],
) -> Option<&'c F> {
    let mut best: Option<(u8, &'c F)> = None;
    for candidate in candidates {
        let (Some(h), Some(a)) = (rank(home, &candidate.home()), rank(away, &candidate.away())) else {
            continue;
        };
        let score = h as u8 + a as u8;
        if best.map_or(true, |(s, _)| score < s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Game {
        home: (&'static str, Option<&'static str>),
        away: (&'static str, Option<&'static str>),
    }

    impl ProviderFixture for Game {
        fn home(&self) -> ProviderTeam<'_> {
            ProviderTeam { name: self.home.0, short_name: self.home.1 }
        }
        fn away(&self) -> ProviderTeam<'_> {
            ProviderTeam { name: self.away.0, short_name: self.away.1 }
        }
    }

    fn keys(external_id: Option<&'static str>, name: &'static str, short: &'static str) -> TeamKeys<'static> {
        TeamKeys { external_id, name, short_name: short }
    }

    #[test]
    fn external_id_beats_short_name() {
        let home = keys(Some("Bayern Munich"), "FC Bayern München", "Leverkusen");
        let away = keys(None, "Hamburger SV", "HSV");
        let games = [
            Game { home: ("Leverkusen", None), away: ("HSV", None) },
            Game { home: ("Bayern Munich", None), away: ("HSV", None) },
        ];
        let found = find_fixture(&home, &away, &games).expect("fixture");
        assert_eq!(found.home.0, "Bayern Munich");
    }

    #[test]
    fn both_sides_must_match_in_order() {
        let home = keys(None, "Borussia Dortmund", "BVB");
        let away = keys(None, "VfL Wolfsburg", "Wolfsburg");
        let swapped = [Game {
            home: ("VfL Wolfsburg", None),
            away: ("Borussia Dortmund", None),
        }];
        assert!(find_fixture(&home, &away, &swapped).is_none());

        let half = [Game { home: ("Borussia Dortmund", None), away: ("Union Berlin", None) }];
        assert!(find_fixture(&home, &away, &half).is_none());
    }

    #[test]
    fn whitespace_is_trimmed() {
        let home = keys(Some(" 1. FC Köln "), "1. FC Köln", "Köln");
        let away = keys(None, "Werder Bremen", "Bremen");
        let games = [Game { home: ("1. FC Köln", None), away: ("Werder Bremen  ", None) }];
        assert!(find_fixture(&home, &away, &games).is_some());
    }

    #[test]
    fn short_name_uses_provider_short_name_when_present() {
        let local = keys(None, "Fortuna Düsseldorf", "Düsseldorf");
        let provider = ProviderTeam { name: "F95", short_name: Some("Düsseldorf") };
        assert_eq!(rank(&local, &provider), Some(MatchRank::ShortName));
    }

    #[test]
    fn empty_keys_never_match() {
        let local = keys(Some(""), "", "");
        let provider = ProviderTeam { name: "", short_name: Some("") };
        assert_eq!(rank(&local, &provider), None);
    }
}
