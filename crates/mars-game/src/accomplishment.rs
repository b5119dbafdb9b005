//! Accomplishment decks and hands.
//!
//! Every role owns a fixed, ordered deck. A player holds a small hand of
//! active cards drawn from the front of that deck. Draws never consult a
//! random source, so replaying the same purchases and discards reproduces
//! the same hands.

use std::collections::VecDeque;

use mars_types::{Accomplishment, AccomplishmentId, ResourceAmount, Role};
use serde::Serialize;

/// One catalog row: id, label, victory points, and cost in canonical
/// resource order (culture, finance, government, legacy, science).
type CatalogRow = (u32, &'static str, u32, [u32; 5]);

const CURATOR: [CatalogRow; 6] = [
    (101, "Martian Art Exhibit", 1, [2, 0, 0, 1, 0]),
    (102, "Oral History Archive", 2, [3, 0, 0, 2, 0]),
    (103, "Colony Anthem", 2, [3, 0, 1, 0, 1]),
    (104, "Museum of the Red Planet", 3, [4, 1, 0, 2, 0]),
    (105, "Founders' Festival", 3, [3, 1, 1, 1, 1]),
    (106, "Interplanetary Heritage Site", 5, [6, 1, 1, 2, 1]),
];

const ENTREPRENEUR: [CatalogRow; 6] = [
    (201, "Ice Mining Venture", 1, [0, 2, 0, 0, 1]),
    (202, "Martian Commodities Exchange", 2, [0, 3, 1, 0, 1]),
    (203, "Greenhouse Franchise", 2, [1, 3, 0, 0, 1]),
    (204, "Orbital Freight Contract", 3, [0, 4, 1, 1, 0]),
    (205, "Colony Credit Union", 3, [1, 3, 1, 1, 1]),
    (206, "Red Planet Stock Listing", 5, [1, 6, 2, 0, 2]),
];

const PIONEER: [CatalogRow; 6] = [
    (301, "First Crater Survey", 1, [0, 0, 0, 2, 1]),
    (302, "Polar Expedition", 2, [1, 0, 0, 3, 1]),
    (303, "Canyon Outpost", 2, [0, 0, 1, 3, 1]),
    (304, "Olympus Mons Summit", 3, [1, 0, 0, 4, 2]),
    (305, "Settler Charter", 3, [1, 1, 1, 3, 1]),
    (306, "Second Colony Landing", 5, [2, 1, 1, 6, 1]),
];

const POLITICIAN: [CatalogRow; 6] = [
    (401, "Colony Bylaws", 1, [0, 1, 2, 0, 0]),
    (402, "Habitat Safety Code", 2, [0, 1, 3, 1, 0]),
    (403, "Water Rights Accord", 2, [1, 0, 3, 1, 0]),
    (404, "Earth Treaty Ratified", 3, [0, 2, 4, 1, 0]),
    (405, "Martian Constitution", 3, [1, 1, 3, 1, 1]),
    (406, "Independent Mars", 5, [2, 2, 6, 1, 0]),
];

const RESEARCHER: [CatalogRow; 6] = [
    (501, "Soil Analysis", 1, [0, 0, 0, 1, 2]),
    (502, "Radiation Shielding Study", 2, [0, 1, 0, 1, 3]),
    (503, "Microbial Survey", 2, [1, 0, 1, 0, 3]),
    (504, "Terraforming Model", 3, [0, 1, 0, 2, 4]),
    (505, "Closed Ecosystem Trial", 3, [1, 1, 1, 1, 3]),
    (506, "Fusion Reactor Prototype", 5, [1, 2, 1, 1, 6]),
];

const fn rows(role: Role) -> &'static [CatalogRow; 6] {
    match role {
        Role::Curator => &CURATOR,
        Role::Entrepreneur => &ENTREPRENEUR,
        Role::Pioneer => &PIONEER,
        Role::Politician => &POLITICIAN,
        Role::Researcher => &RESEARCHER,
    }
}

/// The full, ordered deck for a role.
pub fn catalog(role: Role) -> Vec<Accomplishment> {
    rows(role)
        .iter()
        .map(|&(id, label, victory_points, [culture, finance, government, legacy, science])| {
            Accomplishment {
                id: AccomplishmentId::new(id),
                role,
                label: label.to_owned(),
                victory_points,
                cost: ResourceAmount {
                    culture,
                    finance,
                    government,
                    legacy,
                    science,
                },
            }
        })
        .collect()
}

/// A player's accomplishment cards: the active hand, the remaining deck,
/// and everything purchased so far (oldest first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccomplishmentSet {
    /// Cards available for purchase.
    pub active: Vec<Accomplishment>,
    /// Cards not yet drawn, front first.
    pub deck: VecDeque<Accomplishment>,
    /// Purchased cards in purchase order.
    pub purchased: Vec<Accomplishment>,
}

impl AccomplishmentSet {
    /// A fresh set for `role` with a full hand drawn.
    pub fn new(role: Role, hand_size: usize) -> Self {
        let mut set = Self {
            active: Vec::new(),
            deck: catalog(role).into(),
            purchased: Vec::new(),
        };
        set.refill(hand_size);
        set
    }

    /// Draw from the front of the deck until the hand holds `hand_size`
    /// cards or the deck runs out.
    pub fn refill(&mut self, hand_size: usize) {
        while self.active.len() < hand_size {
            let Some(card) = self.deck.pop_front() else {
                break;
            };
            self.active.push(card);
        }
    }

    /// The active card with the given id.
    pub fn find_active(&self, id: AccomplishmentId) -> Option<&Accomplishment> {
        self.active.iter().find(|card| card.id == id)
    }

    fn take_active(&mut self, id: AccomplishmentId) -> Option<Accomplishment> {
        let index = self.active.iter().position(|card| card.id == id)?;
        Some(self.active.remove(index))
    }

    /// Move an active card to the purchased pile. Returns the card, or
    /// `None` if it is not in the hand. The hand is not refilled.
    pub fn purchase(&mut self, id: AccomplishmentId) -> Option<Accomplishment> {
        let card = self.take_active(id)?;
        self.purchased.push(card.clone());
        Some(card)
    }

    /// Return an active card to the back of the deck. The hand is not
    /// refilled.
    pub fn discard(&mut self, id: AccomplishmentId) -> Option<Accomplishment> {
        let card = self.take_active(id)?;
        self.deck.push_back(card.clone());
        Some(card)
    }

    /// Return the whole hand to the back of the deck, in hand order.
    pub fn discard_all(&mut self) {
        self.deck.extend(self.active.drain(..));
    }

    /// Undo the most recent purchase, returning that card to the back of
    /// the deck.
    pub fn remove_last_purchased(&mut self) -> Option<Accomplishment> {
        let card = self.purchased.pop()?;
        self.deck.push_back(card.clone());
        Some(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_across_roles() {
        let mut ids: Vec<u32> = Role::ALL
            .into_iter()
            .flat_map(catalog)
            .map(|card| card.id.into_inner())
            .collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn new_set_draws_front_of_deck() {
        let set = AccomplishmentSet::new(Role::Pioneer, 3);
        let ids: Vec<u32> = set.active.iter().map(|c| c.id.into_inner()).collect();
        assert_eq!(ids, vec![301, 302, 303]);
        assert_eq!(set.deck.len(), 3);
    }

    #[test]
    fn discard_cycles_card_to_back() {
        let mut set = AccomplishmentSet::new(Role::Curator, 3);
        let discarded = set.discard(AccomplishmentId::new(102));
        assert!(discarded.is_some());
        set.refill(3);
        let ids: Vec<u32> = set.active.iter().map(|c| c.id.into_inner()).collect();
        assert_eq!(ids, vec![101, 103, 104]);
        assert_eq!(set.deck.back().map(|c| c.id), Some(AccomplishmentId::new(102)));
    }

    #[test]
    fn purchase_unknown_card_is_none() {
        let mut set = AccomplishmentSet::new(Role::Curator, 3);
        assert!(set.purchase(AccomplishmentId::new(106)).is_none());
        assert!(set.purchased.is_empty());
    }

    #[test]
    fn remove_last_purchased_pops_most_recent() {
        let mut set = AccomplishmentSet::new(Role::Researcher, 3);
        set.purchase(AccomplishmentId::new(501));
        set.purchase(AccomplishmentId::new(503));
        let removed = set.remove_last_purchased();
        assert_eq!(removed.map(|c| c.id), Some(AccomplishmentId::new(503)));
        assert_eq!(set.purchased.len(), 1);
    }

    #[test]
    fn discard_all_empties_hand() {
        let mut set = AccomplishmentSet::new(Role::Politician, 3);
        set.discard_all();
        assert!(set.active.is_empty());
        assert_eq!(set.deck.len(), 6);
        set.refill(1);
        assert_eq!(set.active.len(), 1);
        assert_eq!(set.active.first().map(|c| c.id), Some(AccomplishmentId::new(404)));
    }
}
