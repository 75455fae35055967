use super::types::Page;

/// Positional slice `[offset, offset + page_size)` of an already ordered list.
pub fn page_of<T: Clone>(list: &[T], offset: u32, page_size: u32) -> Page<T> {
    let start = (offset as usize).min(list.len());
    let end = start.saturating_add(page_size as usize).min(list.len());

    Page {
        page: list[start..end].to_vec(),
        offset,
        page_size,
        total: list.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_page() {
        let rows: Vec<u32> = (1..=45).collect();
        let p = page_of(&rows, 20, 20);

        assert_eq!(p.page, (21..=40).collect::<Vec<_>>());
        assert_eq!(p.total, 45);
        assert_eq!(p.offset, 20);
        assert_eq!(p.page_size, 20);
    }

    #[test]
    fn test_last_partial_page() {
        let rows: Vec<u32> = (1..=45).collect();
        assert_eq!(page_of(&rows, 40, 20).page, vec![41, 42, 43, 44, 45]);
    }

    #[test]
    fn test_offset_past_end() {
        let rows: Vec<u32> = (1..=5).collect();
        let p = page_of(&rows, 100, 20);
        assert!(p.page.is_empty());
        assert_eq!(p.total, 5);
    }
}
