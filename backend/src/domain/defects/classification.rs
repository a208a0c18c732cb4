//! Part categories and priorities used to classify a defect.

use crate::domain::text_enum::text_enum;

text_enum! {
    /// Category of the part suspected or confirmed to have failed.
    ///
    /// Older intake screens used storage-specific names (`HDD`, `SSD`), a short
    /// `RAID` label, and `RAM_ECC`; those spellings still parse.
    pub enum PartCategory ("part category") {
        /// Processor.
        Cpu => "CPU",
        /// Memory module.
        Ram => "RAM" | "RAM_ECC" | "MEMORY",
        /// System board.
        Motherboard => "MOTHERBOARD",
        /// Any storage drive.
        Disk => "DISK" | "HDD" | "SSD" | "NVME",
        /// Power supply unit.
        Psu => "PSU",
        /// Cooling fan.
        Fan => "FAN",
        /// RAID or HBA controller.
        RaidController => "RAID_CONTROLLER" | "RAID",
        /// Network interface card.
        Nic => "NIC" | "NETWORK_CARD",
        /// Drive backplane.
        Backplane => "BACKPLANE",
        /// Baseboard management controller.
        Bmc => "BMC",
        /// Internal cabling.
        Cable => "CABLE",
        /// Anything else.
        Other => "OTHER",
    }
}

impl PartCategory {
    /// Display label for operator-facing lists.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Cpu => "Processor",
            Self::Ram => "Memory",
            Self::Motherboard => "Motherboard",
            Self::Disk => "Drive",
            Self::Psu => "Power supply",
            Self::Fan => "Fan",
            Self::RaidController => "RAID controller",
            Self::Nic => "Network card",
            Self::Backplane => "Backplane",
            Self::Bmc => "BMC",
            Self::Cable => "Cable",
            Self::Other => "Other",
        }
    }
}

text_enum! {
    /// Urgency assigned to a defect at intake.
    pub enum DefectPriority ("defect priority") {
        /// Can wait for a batch.
        Low => "LOW",
        /// Normal queue.
        Medium => "MEDIUM",
        /// Blocks a shipment.
        High => "HIGH",
        /// Blocks the line.
        Critical => "CRITICAL",
    }
}

impl Default for DefectPriority {
    fn default() -> Self {
        Self::Medium
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("HDD", PartCategory::Disk)]
    #[case("ssd", PartCategory::Disk)]
    #[case("RAID", PartCategory::RaidController)]
    #[case("RAM_ECC", PartCategory::Ram)]
    #[case("raid_controller", PartCategory::RaidController)]
    fn legacy_category_spellings_parse(#[case] raw: &str, #[case] expected: PartCategory) {
        assert_eq!(raw.parse::<PartCategory>(), Ok(expected));
    }

    #[rstest]
    fn every_category_has_a_label() {
        assert!(PartCategory::ALL.iter().all(|category| !category.label().is_empty()));
        assert_eq!(PartCategory::ALL.len(), 12);
    }

    #[rstest]
    fn priority_defaults_to_medium() {
        assert_eq!(DefectPriority::default(), DefectPriority::Medium);
    }
}
