labelled_enum! {
    /// Opportunity sales stage, totally ordered from first contact to close.
    pub enum SalesStage {
        /// Initial discovery.
        Prospecting => "Prospecting",
        /// Fit confirmed.
        Qualification => "Qualification",
        /// Requirements gathering.
        NeedsAnalysis => "Needs Analysis",
        /// Value pitched.
        ValueProposition => "Value Proposition",
        /// Buying committee identified.
        IdDecisionMakers => "Id. Decision Makers",
        /// Buyer perception assessed.
        PerceptionAnalysis => "Perception Analysis",
        /// Proposal sent.
        ProposalPriceQuote => "Proposal/Price Quote",
        /// Final terms under negotiation.
        NegotiationReview => "Negotiation/Review",
        /// Deal won.
        ClosedWon => "Closed Won",
        /// Deal lost.
        ClosedLost => "Closed Lost",
    }
}

impl SalesStage {
    /// Position in the stage table, starting at 1.
    pub fn order(&self) -> u8 {
        match self {
            SalesStage::Prospecting => 1,
            SalesStage::Qualification => 2,
            SalesStage::NeedsAnalysis => 3,
            SalesStage::ValueProposition => 4,
            SalesStage::IdDecisionMakers => 5,
            SalesStage::PerceptionAnalysis => 6,
            SalesStage::ProposalPriceQuote => 7,
            SalesStage::NegotiationReview => 8,
            SalesStage::ClosedWon => 9,
            SalesStage::ClosedLost => 10,
        }
    }

    /// Win probability (0-100) assumed when none is given explicitly.
    pub fn default_probability(&self) -> u8 {
        match self {
            SalesStage::Prospecting => 10,
            SalesStage::Qualification => 20,
            SalesStage::NeedsAnalysis => 25,
            SalesStage::ValueProposition => 30,
            SalesStage::IdDecisionMakers => 40,
            SalesStage::PerceptionAnalysis => 50,
            SalesStage::ProposalPriceQuote => 65,
            SalesStage::NegotiationReview => 80,
            SalesStage::ClosedWon => 100,
            SalesStage::ClosedLost => 0,
        }
    }

    /// Whether the deal has an outcome.
    pub fn is_closed(&self) -> bool {
        matches!(self, SalesStage::ClosedWon | SalesStage::ClosedLost)
    }

    /// Look up a stage by table position.
    pub fn from_order(order: u8) -> Option<SalesStage> {
        SalesStage::ALL.iter().copied().find(|s| s.order() == order)
    }

    /// Stages that still count toward the open pipeline, in order.
    pub fn open_stages() -> impl Iterator<Item = SalesStage> {
        SalesStage::ALL.iter().copied().filter(|s| !s.is_closed())
    }
}
