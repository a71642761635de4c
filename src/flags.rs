use bitflags::bitflags;

bitflags! {
    /// Status bits carried by every [`VNode`](crate::VNode).
    ///
    /// `PLACEMENT`, `UPDATE` and `DELETION` are pending operations and are cleared when the
    /// node is committed. The remaining bits describe the node itself and survive commits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u8 {
        const PLACEMENT = 1 << 0;
        const UPDATE = 1 << 1;
        const DELETION = 1 << 2;
        const HAS_MEMO_ANCESTOR = 1 << 3;
        const STATIC_DOM = 1 << 4;
        const MEMO = 1 << 5;

        const PENDING = Self::PLACEMENT.bits() | Self::UPDATE.bits() | Self::DELETION.bits();
        const HINTS = Self::STATIC_DOM.bits() | Self::MEMO.bits();
    }
}

impl Flags {
    pub fn has_pending(self) -> bool {
        self.intersects(Self::PENDING)
    }

    /// Flags a child created under a node with these flags inherits.
    pub fn inherited(self) -> Self {
        if self.intersects(Self::MEMO | Self::HAS_MEMO_ANCESTOR) {
            Self::HAS_MEMO_ANCESTOR
        } else {
            Self::empty()
        }
    }
}
