use ash::vk;
use color_eyre::Result;
use smallvec::SmallVec;

/// Queue families chosen on a physical device
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// `(graphics, present)` once both are known
    pub fn pair(&self) -> Option<(u32, u32)> {
        Some((self.graphics?, self.present?))
    }

    /// Distinct family indices, graphics first
    pub fn unique(&self) -> SmallVec<[u32; 2]> {
        let mut families = SmallVec::new();
        for index in [self.graphics, self.present].into_iter().flatten() {
            if !families.contains(&index) {
                families.push(index);
            }
        }
        families
    }
}

/// Walks the queue families once, testing graphics capability and presentation support
/// independently for every index, and stops as soon as both are found.
pub fn find_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> Result<QueueFamilyIndices>
where
    F: FnMut(u32) -> Result<bool>,
{
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in (0u32..).zip(families) {
        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(index);
        }
        if supports_present(index)? {
            indices.present = Some(index);
        }
        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

pub struct Queue {
    pub family_index: u32,
    pub handle: vk::Queue,
}

impl Queue {
    pub fn new(
        family_index: u32,
        handle: vk::Queue,
    ) -> Self {
        Self {
            family_index,
            handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn same_family_satisfies_both() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = find_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.pair(), Some((0, 0)));
        assert_eq!(indices.unique().as_slice(), &[0]);
    }

    #[test]
    fn separate_graphics_and_present_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = find_queue_families(&families, |i| Ok(i == 1)).unwrap();
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(1));
        assert_eq!(indices.unique().as_slice(), &[0, 1]);
    }

    #[test]
    fn stops_at_first_complete_index() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut probed = Vec::new();
        let indices = find_queue_families(&families, |i| {
            probed.push(i);
            Ok(i == 1)
        })
        .unwrap();
        assert_eq!(indices.pair(), Some((1, 1)));
        assert_eq!(probed, vec![0, 1]);
    }

    #[test]
    fn incomplete_without_presentation() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = find_queue_families(&families, |_| Ok(false)).unwrap();
        assert!(!indices.is_complete());
        assert_eq!(indices.pair(), None);
    }

    #[test]
    fn incomplete_without_graphics() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        let indices = find_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.graphics, None);
        assert_eq!(indices.present, Some(0));
        assert!(!indices.is_complete());
    }

    #[test]
    fn present_query_failure_propagates() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = find_queue_families(&families, |_| {
            Err(color_eyre::eyre::eyre!("surface lost"))
        });
        assert!(result.is_err());
    }
}
