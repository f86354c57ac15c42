// Queue family selection
//
// Graphics and present usually share a family. Compute and transfer prefer
// dedicated families so async work does not contend with rendering.

use ash::vk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
    pub compute: u32,
    pub transfer: u32,
}

impl QueueFamilyIndices {
    /// Pick queue families from `families`.
    ///
    /// `supports_present` reports whether a family index can present to the
    /// target surface. Returns `None` without a graphics or a present family.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        supports_present: impl Fn(u32) -> bool,
    ) -> Option<Self> {
        let usable = |flags: vk::QueueFlags| {
            families
                .iter()
                .enumerate()
                .filter(move |(_, props)| props.queue_count > 0 && props.queue_flags.contains(flags))
                .map(|(i, props)| (i as u32, props.queue_flags))
        };

        let graphics = usable(vk::QueueFlags::GRAPHICS).map(|(i, _)| i).next()?;

        let present = if supports_present(graphics) {
            graphics
        } else {
            (0..families.len() as u32)
                .filter(|&i| families[i as usize].queue_count > 0)
                .find(|&i| supports_present(i))?
        };

        let compute = usable(vk::QueueFlags::COMPUTE)
            .map(|(i, _)| i)
            .find(|&i| i != graphics)
            .unwrap_or(graphics);

        let transfer = usable(vk::QueueFlags::TRANSFER)
            .find(|(_, flags)| {
                !flags.intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            })
            .map(|(i, _)| i)
            .unwrap_or(graphics);

        Some(Self {
            graphics,
            present,
            compute,
            transfer,
        })
    }

    /// Distinct family indices, one `VkDeviceQueueCreateInfo` each
    pub fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics, self.present, self.compute, self.transfer];
        families.sort_unstable();
        families.dedup();
        families
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    const ALL: vk::QueueFlags = vk::QueueFlags::from_raw(
        vk::QueueFlags::GRAPHICS.as_raw()
            | vk::QueueFlags::COMPUTE.as_raw()
            | vk::QueueFlags::TRANSFER.as_raw(),
    );

    #[test]
    fn single_universal_family() {
        let families = [family(ALL, 16)];
        let qfi = QueueFamilyIndices::find(&families, |_| true).unwrap();
        assert_eq!(
            qfi,
            QueueFamilyIndices {
                graphics: 0,
                present: 0,
                compute: 0,
                transfer: 0
            }
        );
        assert_eq!(qfi.unique(), vec![0]);
    }

    #[test]
    fn prefers_dedicated_compute_and_transfer() {
        // Typical discrete GPU layout
        let families = [
            family(ALL, 16),
            family(vk::QueueFlags::TRANSFER | vk::QueueFlags::SPARSE_BINDING, 2),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 8),
        ];
        let qfi = QueueFamilyIndices::find(&families, |i| i == 0).unwrap();
        assert_eq!(qfi.graphics, 0);
        assert_eq!(qfi.present, 0);
        assert_eq!(qfi.compute, 2);
        assert_eq!(qfi.transfer, 1);
        assert_eq!(qfi.unique(), vec![0, 1, 2]);
    }

    #[test]
    fn separate_present_family() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1), family(vk::QueueFlags::TRANSFER, 1)];
        let qfi = QueueFamilyIndices::find(&families, |i| i == 1).unwrap();
        assert_eq!(qfi.graphics, 0);
        assert_eq!(qfi.present, 1);
        // no compute family at all falls back to graphics
        assert_eq!(qfi.compute, 0);
        assert_eq!(qfi.transfer, 1);
    }

    #[test]
    fn empty_families_are_skipped() {
        let families = [family(ALL, 0), family(ALL, 4)];
        let qfi = QueueFamilyIndices::find(&families, |_| true).unwrap();
        assert_eq!(qfi.graphics, 1);
        assert_eq!(qfi.present, 1);
    }

    #[test]
    fn no_graphics_or_no_present_is_unsuitable() {
        let compute_only = [family(vk::QueueFlags::COMPUTE, 4)];
        assert!(QueueFamilyIndices::find(&compute_only, |_| true).is_none());

        let families = [family(ALL, 4)];
        assert!(QueueFamilyIndices::find(&families, |_| false).is_none());
    }
}
