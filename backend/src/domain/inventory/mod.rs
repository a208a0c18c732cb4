//! Inventory components, installed-part records, and ledger queries.

mod component;
mod query;

pub use component::{
    ComponentCondition, InventoryComponent, InventoryStatus, NewInventoryComponent,
    ServerComponent,
};
pub use query::{ComponentFilter, ComponentPage, InventoryStats, warranty_lapses_within};

#[cfg(test)]
mod tests {
    //! Regression coverage for inventory entity invariants.

    use chrono::{NaiveDate, TimeZone, Utc};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::defects::PartCategory;
    use crate::domain::{ComponentId, DefectId, ServerId, UserId};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[fixture]
    fn component() -> InventoryComponent {
        let at = Utc
            .with_ymd_and_hms(2026, 1, 10, 9, 0, 0)
            .single()
            .expect("valid timestamp");
        InventoryComponent::receive(
            ComponentId::random(),
            NewInventoryComponent {
                serial_number: " SN-100 ".to_owned(),
                vendor_serial: Some("Y-100".to_owned()),
                category: PartCategory::Ram,
                manufacturer: Some("Samsung".to_owned()),
                model: Some("M393A4K40DB3".to_owned()),
                condition: None,
                location: Some("Rack B / shelf 2".to_owned()),
                purchase_date: None,
                warranty_expires: Some(date(2026, 2, 1)),
                catalog_ref: None,
                notes: None,
            },
            UserId::random(),
            at,
        )
    }

    #[rstest]
    fn intake_is_available_and_new(component: InventoryComponent) {
        assert_eq!(component.status(), InventoryStatus::Available);
        assert_eq!(component.condition, ComponentCondition::New);
        assert_eq!(component.serial_number, "SN-100");
        assert!(component.links_consistent());
    }

    #[rstest]
    fn serial_match_covers_both_serials(component: InventoryComponent) {
        assert!(component.has_serial("sn-100"));
        assert!(component.has_serial("y-100"));
        assert!(!component.has_serial("SN-101"));
    }

    #[rstest]
    fn link_invariant_tracks_status(mut component: InventoryComponent) {
        let at = component.updated_at;
        component.set_status(InventoryStatus::Reserved, at);
        assert!(!component.links_consistent());
        component.reserved_for_defect_id = Some(DefectId::random());
        assert!(component.links_consistent());

        component.set_status(InventoryStatus::InUse, at);
        component.current_server_id = Some(ServerId::random());
        assert!(!component.links_consistent());
        component.reserved_for_defect_id = None;
        assert!(component.links_consistent());

        component.set_status(InventoryStatus::Defective, at);
        assert!(component.links_consistent());
        component.set_status(InventoryStatus::Available, at);
        assert!(!component.links_consistent());
    }

    #[rstest]
    fn filter_matches_substrings_case_insensitively(component: InventoryComponent) {
        let today = date(2026, 1, 15);
        let filter = ComponentFilter {
            manufacturer: Some("SAMS".to_owned()),
            location: Some("rack b".to_owned()),
            search: Some("y-10".to_owned()),
            ..ComponentFilter::default()
        };
        assert!(filter.matches(&component, today));

        let expired = ComponentFilter {
            warranty_expired: Some(true),
            ..ComponentFilter::default()
        };
        assert!(!expired.matches(&component, today));
        assert!(expired.matches(&component, date(2026, 3, 1)));
    }

    #[rstest]
    fn stats_count_statuses_and_expiring_warranties(component: InventoryComponent) {
        let mut scrapped = component.clone();
        scrapped.id = ComponentId::random();
        scrapped.set_status(InventoryStatus::Scrapped, scrapped.updated_at);

        let stats = InventoryStats::collect(
            [&component, &scrapped],
            date(2026, 1, 15),
            date(2026, 2, 14),
        );
        assert_eq!(stats.total, 2);
        assert_eq!(stats.count(InventoryStatus::Available), 1);
        assert_eq!(stats.count(InventoryStatus::Scrapped), 1);
        assert_eq!(stats.warranty_expiring, 1);
        assert_eq!(
            stats.by_category[&PartCategory::Ram][&InventoryStatus::Available],
            1
        );
    }
}
