//! Earning rules scraped from listing text.

use std::sync::LazyLock;

use bonusmap_shared::Reward;
use regex::Regex;

/// `4 %`, `4,5%`, `12.5 %`.
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)?)\s*%").expect("percent regex")
});

/// `150 kr`.
static KRONER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*kr\b").expect("kroner regex")
});

/// `10 poeng / 100 kr`.
static PER_100_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*poeng\s*/\s*100\s*kr").expect("per-100 regex")
});

/// `500 poeng`.
static POINTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*poeng").expect("points regex")
});

/// Trumf listings: every percentage and every fixed kroner bonus in the text.
pub fn trumf_rewards(text: &str, category: Option<&str>) -> Vec<Reward> {
    let category = category.map(str::to_string);
    let mut rewards = Vec::new();

    for caps in PERCENT_RE.captures_iter(text) {
        if let Ok(value) = caps[1].replace(',', ".").parse::<f64>() {
            rewards.push(Reward::Percentage {
                value,
                category: category.clone(),
            });
        }
    }

    for caps in KRONER_RE.captures_iter(text) {
        if let Ok(value) = caps[1].parse::<u32>() {
            rewards.push(Reward::FixedBonus {
                value,
                category: category.clone(),
            });
        }
    }

    rewards
}

/// SAS listings: a points-per-100-kr rate, else a one-off points bonus.
pub fn sas_rewards(text: &str) -> Vec<Reward> {
    if let Some(value) = first_number(&PER_100_RE, text) {
        return vec![Reward::Per100Kr { value }];
    }
    if let Some(value) = first_number(&POINTS_RE, text) {
        return vec![Reward::SignupBonus { value }];
    }
    Vec::new()
}

fn first_number(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text).and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trumf_percent_and_kroner() {
        let rewards = trumf_rewards("Opptil 4,5 % Trumf-bonus + 150 kr ekstra", Some("Klær"));
        assert_eq!(
            rewards,
            vec![
                Reward::Percentage {
                    value: 4.5,
                    category: Some("Klær".into())
                },
                Reward::FixedBonus {
                    value: 150,
                    category: Some("Klær".into())
                },
            ]
        );
    }

    #[test]
    fn trumf_without_rewards() {
        assert!(trumf_rewards("Ingen bonus nå", None).is_empty());
    }

    #[test]
    fn sas_rate_wins_over_bonus() {
        assert_eq!(sas_rewards("Tjen 10 poeng / 100 kr"), vec![Reward::Per100Kr { value: 10 }]);
        assert_eq!(sas_rewards("Få 500 poeng på første kjøp"), vec![Reward::SignupBonus { value: 500 }]);
        assert!(sas_rewards("Ukjent").is_empty());
    }
}
