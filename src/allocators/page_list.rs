//! Page storage and the three page lists.
//!
//! Pages live in a slot table and are addressed by index. Each list is a
//! doubly-linked chain threaded through the pages' [`Links`], with its head
//! and length kept in a [`PageList`] owned by the arena. Every page carries
//! the [`PageState`] of the list it is on, so removal never has to guess
//! which head it belongs to.

use super::page::{Links, Page, PageId, PageState};

struct Slot<M, F> {
    generation: u32,
    page: Option<Page<M, F>>,
}

/// Head and length of one page list.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct PageList {
    state: PageState,
    head: Option<u32>,
    len: usize,
}

impl PageList {
    /// An empty list whose members are tagged `state`.
    pub fn new(state: PageState) -> Self {
        Self {
            state,
            head: None,
            len: 0,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn head(&self) -> Option<u32> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// Slot table owning every live page.
pub(crate) struct PageTable<M, F> {
    slots: Vec<Slot<M, F>>,
    free: Vec<u32>,
    live: usize,
}

impl<M, F> PageTable<M, F> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Number of live pages.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Store an unlinked page, returning its slot index.
    pub fn insert(&mut self, page: Page<M, F>) -> u32 {
        debug_assert!(!page.links.linked);
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.page = Some(page);
            index
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                page: Some(page),
            });
            index
        }
    }

    /// Take an unlinked page out of the table.
    pub fn take(&mut self, index: u32) -> Page<M, F> {
        let page = match self.slots[index as usize].page.take() {
            Some(page) => page,
            None => unreachable!("page slot {} is vacant", index),
        };
        debug_assert!(!page.links.linked, "freeing page {} while still listed", index);
        self.free.push(index);
        self.live -= 1;
        page
    }

    pub fn id_of(&self, index: u32) -> PageId {
        PageId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Slot index of `id`, if it still names a live page.
    pub fn resolve(&self, id: PageId) -> Option<u32> {
        let slot = self.slots.get(id.index as usize)?;
        (slot.generation == id.generation && slot.page.is_some()).then_some(id.index)
    }

    pub fn page(&self, index: u32) -> &Page<M, F> {
        match &self.slots[index as usize].page {
            Some(page) => page,
            None => unreachable!("page slot {} is vacant", index),
        }
    }

    pub fn page_mut(&mut self, index: u32) -> &mut Page<M, F> {
        match &mut self.slots[index as usize].page {
            Some(page) => page,
            None => unreachable!("page slot {} is vacant", index),
        }
    }

    /// Live slot indices in table order.
    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.page.is_some())
            .map(|(index, _)| index as u32)
    }

    /// Walk a list from its head.
    pub fn iter<'a>(&'a self, list: &PageList) -> ListIter<'a, M, F> {
        ListIter {
            table: self,
            next: list.head,
        }
    }

    /// Is `index` reachable from `list`'s head?
    pub fn contains(&self, list: &PageList, index: u32) -> bool {
        self.iter(list).any(|i| i == index)
    }

    /// Insert an unlinked page at the head of `list`.
    pub fn push_front(&mut self, list: &mut PageList, index: u32) {
        let head = list.head;
        {
            let page = self.page_mut(index);
            debug_assert!(
                !page.links.linked,
                "page {} is already on the {:?} list",
                index,
                page.state
            );
            page.links = Links {
                prev: None,
                next: head,
                linked: true,
            };
            page.state = list.state;
        }
        if let Some(head) = head {
            self.page_mut(head).links.prev = Some(index);
        }
        list.head = Some(index);
        list.len += 1;
    }

    /// Unlink a page from `list`, which must be the list it is on.
    pub fn remove(&mut self, list: &mut PageList, index: u32) {
        let links = {
            let page = self.page(index);
            debug_assert!(page.links.linked, "page {} is not on any list", index);
            debug_assert_eq!(
                page.state, list.state,
                "page {} removed from the wrong list",
                index
            );
            page.links
        };

        match links.prev {
            Some(prev) => self.page_mut(prev).links.next = links.next,
            None => {
                debug_assert_eq!(list.head, Some(index));
                list.head = links.next;
            }
        }
        if let Some(next) = links.next {
            self.page_mut(next).links.prev = links.prev;
        }

        self.page_mut(index).links = Links::default();
        list.len -= 1;
    }

    /// Unlink and return the head of `list`.
    pub fn pop_front(&mut self, list: &mut PageList) -> Option<u32> {
        let head = list.head?;
        self.remove(list, head);
        Some(head)
    }

    /// Prepend every page of `chain` to `dest`, keeping chain order.
    ///
    /// Walks the chain once to retag its pages and find its tail; the splice
    /// itself is constant time.
    pub fn splice_front(&mut self, dest: &mut PageList, chain: PageList) {
        let Some(chain_head) = chain.head else {
            return;
        };

        #[cfg(debug_assertions)]
        {
            for index in self.iter(&chain) {
                assert!(
                    !self.contains(dest, index),
                    "page {} would be linked into the {:?} list twice",
                    index,
                    dest.state
                );
            }
        }
        debug_assert!(self.page(chain_head).links.prev.is_none());

        let mut tail = chain_head;
        loop {
            let page = self.page_mut(tail);
            page.state = dest.state;
            match page.links.next {
                Some(next) => tail = next,
                None => break,
            }
        }

        self.page_mut(tail).links.next = dest.head;
        if let Some(head) = dest.head {
            self.page_mut(head).links.prev = Some(tail);
        }
        dest.head = Some(chain_head);
        dest.len += chain.len;
    }

    /// Check one list's links, tags and length.
    pub fn validate_list(&self, list: &PageList) -> Result<(), String> {
        let mut prev = None;
        let mut count = 0usize;
        let mut cursor = list.head;

        while let Some(index) = cursor {
            let Some(Some(page)) = self.slots.get(index as usize).map(|s| s.page.as_ref()) else {
                return Err(format!("{:?} list links to vacant slot {}", list.state, index));
            };
            if page.links.prev != prev {
                return Err(format!(
                    "{:?} list: page {} has back-link {:?}, expected {:?}",
                    list.state, index, page.links.prev, prev
                ));
            }
            if !page.links.linked || page.state != list.state {
                return Err(format!(
                    "{:?} list: page {} is tagged {:?} (linked: {})",
                    list.state, index, page.state, page.links.linked
                ));
            }
            count += 1;
            if count > self.live {
                return Err(format!("{:?} list has a cycle", list.state));
            }
            prev = Some(index);
            cursor = page.links.next;
        }

        if count != list.len {
            return Err(format!(
                "{:?} list holds {} pages but records {}",
                list.state, count, list.len
            ));
        }
        Ok(())
    }
}

/// Iterator over the slot indices of one list.
pub(crate) struct ListIter<'a, M, F> {
    table: &'a PageTable<M, F>,
    next: Option<u32>,
}

impl<M, F> Iterator for ListIter<'_, M, F> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let index = self.next?;
        self.next = self.table.page(index).links.next;
        Some(index)
    }
}
