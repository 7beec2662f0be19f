//! Card reward catalog and the text form the model is prompted with.
//!
//! Rendered shape, one block per card, blocks joined by `\n---\n`:
//!
//! ```text
//!
//! Bilt Mastercard:
//! - Dining: 3x points
//! - Rent payments: 1x point (Up to 100,000 points per calendar year)
//!
//! Special: No annual fee.
//! ```

use serde::{Deserialize, Serialize};

const PORTAL_INDICATORS: &[&str] = &[
    "citi travel",
    "capital one travel",
    "amex travel",
    "bilt portal",
    "through portal",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub category: String,
    pub multiplier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Reward {
    /// Earning rates that only apply when booking through an issuer's shopping or travel portal.
    pub fn is_portal(&self) -> bool {
        let category = self.category.to_lowercase();
        PORTAL_INDICATORS.iter().any(|p| category.contains(p))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCard {
    pub name: String,
    pub rewards: Vec<Reward>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_rules: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardCatalog {
    pub cards: Vec<CreditCard>,
}

impl CardCatalog {
    pub fn builtin() -> Self {
        Self {
            cards: vec![
                card(
                    "Citi Double Cash",
                    &[
                        ("Hotels, car rentals, attractions (Citi Travel)", "5% cash back", Some("3% additional + 2% base")),
                        ("All purchases", "2% cash back", Some("1% when you buy + 1% when you pay")),
                    ],
                    Some("Must pay at least minimum payment on time to earn the 1% payback portion."),
                ),
                card(
                    "Citi Custom Cash",
                    &[
                        ("Highest spend category", "5% cash back", Some("Up to $500/month - Categories: Restaurants, Gas Stations, Grocery Stores, Select Travel, Select Transit, Select Streaming, Drugstores, Home Improvement, Fitness Clubs, Live Entertainment")),
                        ("Hotels, car rentals, attractions (Citi Travel)", "5% cash back", Some("4% additional + 1% base, through 6/30/2026")),
                        ("After $500 in highest category", "1% cash back", None),
                        ("All other purchases", "1% cash back", None),
                    ],
                    Some("Automatically awards 5% on your highest spend category each billing cycle - no activation needed."),
                ),
                card(
                    "Citi Strata Premier",
                    &[
                        ("Hotels, car rentals, attractions (Citi Travel)", "10x points", None),
                        ("Air travel and other hotels", "3x points", None),
                        ("Restaurants", "3x points", None),
                        ("Supermarkets", "3x points", None),
                        ("Gas stations and EV charging", "3x points", None),
                        ("All other purchases", "1x point", None),
                    ],
                    Some("$95 annual fee. $100 annual hotel credit (single stay of $500+ through Citi Travel). Points transfer to airline/hotel partners at 1:1."),
                ),
                card(
                    "Citi Strata",
                    &[
                        ("Hotels, car rentals, attractions (Citi Travel)", "5x points", None),
                        ("Supermarkets", "3x points", None),
                        ("Select transit purchases", "3x points", None),
                        ("Gas and EV charging stations", "3x points", None),
                        ("Self-select category", "3x points", Some("Choose from: Fitness Clubs, Select Streaming, Live Entertainment, Cosmetic Stores/Barber/Salons, Pet Stores - changeable once per quarter")),
                        ("Restaurants", "2x points", None),
                        ("All other purchases", "1x point", None),
                    ],
                    Some("No annual fee. Default self-select category is Select Streaming Services."),
                ),
                card(
                    "Capital One Venture X",
                    &[
                        ("Hotels and rental cars (Capital One Travel)", "10x miles", None),
                        ("Flights and vacation rentals (Capital One Travel)", "5x miles", None),
                        ("Capital One Entertainment purchases", "5x miles", None),
                        ("All other purchases", "2x miles", None),
                    ],
                    Some("$395 annual fee. $300 annual Capital One Travel credit. 10,000 bonus miles each anniversary."),
                ),
                card(
                    "Amex Platinum",
                    &[
                        ("Flights (direct with airlines or Amex Travel)", "5x points", Some("Up to $500,000 per calendar year, then 1x")),
                        ("Prepaid hotels (Amex Travel)", "5x points", None),
                        ("All other purchases", "1x point", None),
                    ],
                    Some("$895 annual fee. Extensive travel and lifestyle credits ($300 digital entertainment, $200 Uber, $200 airline fee)."),
                ),
                card(
                    "Amex Blue Cash Everyday",
                    &[
                        ("U.S. supermarkets", "3% cash back", Some("Up to $6,000 per year, then 1%")),
                        ("U.S. online retail purchases", "3% cash back", Some("Up to $6,000 per year, then 1%")),
                        ("U.S. gas stations", "3% cash back", Some("Up to $6,000 per year, then 1%")),
                        ("All other purchases", "1% cash back", None),
                    ],
                    Some("No annual fee. Up to $84 Disney Bundle credit annually ($7/month). Up to $180 Home Chef credit annually ($15/month)."),
                ),
                card(
                    "Bilt Mastercard",
                    &[
                        ("Lyft rides", "5x points", Some("When accounts are linked")),
                        ("Dining", "3x points", None),
                        ("Travel (booked directly or through Bilt portal)", "2x points", None),
                        ("Rent payments", "1x point", Some("Up to 100,000 points per calendar year, no transaction fee")),
                        ("All other purchases", "1x point", None),
                    ],
                    Some("No annual fee. Must make at least 5 transactions per statement period to earn points. Rent Day bonus: Double points on non-rent purchases on 1st of each month (up to 1,000 bonus points)."),
                ),
            ],
        }
    }

    /// Drops portal-only rewards, then any card left without rewards.
    pub fn without_portal_rewards(&self) -> Self {
        let cards = self
            .cards
            .iter()
            .filter_map(|c| {
                let rewards: Vec<Reward> =
                    c.rewards.iter().filter(|r| !r.is_portal()).cloned().collect();
                (!rewards.is_empty()).then(|| CreditCard {
                    rewards,
                    ..c.clone()
                })
            })
            .collect();
        Self { cards }
    }

    /// Serializes the catalog into the prompt text format.
    pub fn render(&self) -> String {
        self.cards
            .iter()
            .filter(|c| !c.rewards.is_empty())
            .map(CreditCard::render)
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

impl CreditCard {
    fn render(&self) -> String {
        let rewards = self
            .rewards
            .iter()
            .map(|r| match &r.details {
                Some(details) => format!("- {}: {} ({details})", r.category, r.multiplier),
                None => format!("- {}: {}", r.category, r.multiplier),
            })
            .collect::<Vec<_>>()
            .join("\n");
        let special = self
            .special_rules
            .as_deref()
            .map(|s| format!("\nSpecial: {s}"))
            .unwrap_or_default();
        format!("\n{}:\n{rewards}\n{special}", self.name)
    }
}

fn card(name: &str, rewards: &[(&str, &str, Option<&str>)], special_rules: Option<&str>) -> CreditCard {
    CreditCard {
        name: name.to_string(),
        rewards: rewards
            .iter()
            .map(|(category, multiplier, details)| Reward {
                category: category.to_string(),
                multiplier: multiplier.to_string(),
                details: details.map(str::to_string),
            })
            .collect(),
        special_rules: special_rules.map(str::to_string),
    }
}

/// Canned purchase descriptions offered as one-tap shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuickCategory {
    pub id: &'static str,
    pub label: &'static str,
    pub query: &'static str,
}

pub const QUICK_CATEGORIES: &[QuickCategory] = &[
    QuickCategory { id: "dining", label: "Dining", query: "restaurant dinner" },
    QuickCategory { id: "grocery", label: "Grocery", query: "grocery store supermarket" },
    QuickCategory { id: "gas", label: "Gas", query: "gas station fuel" },
    QuickCategory { id: "online", label: "Online", query: "online shopping amazon retail" },
    QuickCategory { id: "hotel", label: "Hotel", query: "hotel booking accommodation" },
    QuickCategory { id: "flight", label: "Flights", query: "airline flight ticket" },
    QuickCategory { id: "streaming", label: "Streaming", query: "netflix streaming subscription" },
    QuickCategory { id: "rent", label: "Rent", query: "rent payment apartment" },
];

pub fn quick_category(id: &str) -> Option<&'static QuickCategory> {
    QUICK_CATEGORIES
        .iter()
        .find(|c| c.id.eq_ignore_ascii_case(id.trim()))
}
