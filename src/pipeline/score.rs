/// Negative signals and what each costs out of 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    Syntax,
    DomainNotFound,
    NullMx,
    ImplicitRoute,
    Disposable,
    Blacklisted,
    Role,
    NoReply,
    Typo,
    MailboxRejected,
    CatchAll,
    MailboxFull,
    /// Nothing conclusive came back (DNS failure, skipped or busy hosts).
    Unverified,
}

impl Penalty {
    pub const fn weight(self) -> u8 {
        match self {
            Self::Syntax | Self::DomainNotFound | Self::Blacklisted => 100,
            Self::MailboxRejected => 80,
            Self::NullMx => 60,
            Self::Disposable => 50,
            Self::NoReply | Self::CatchAll | Self::Unverified => 30,
            Self::MailboxFull => 25,
            Self::Role => 20,
            Self::Typo => 15,
            Self::ImplicitRoute => 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ScoreCard {
    penalties: Vec<Penalty>,
}

impl ScoreCard {
    pub fn add(&mut self, penalty: Penalty) {
        if !self.penalties.contains(&penalty) {
            self.penalties.push(penalty);
        }
    }

    /// `100 - sum(weights)`, floored at zero.
    pub fn score(&self) -> u8 {
        let total: u32 = self
            .penalties
            .iter()
            .map(|penalty| u32::from(penalty.weight()))
            .sum();
        100u32.saturating_sub(total) as u8
    }
}
