/// One-shot collection capability shared by the two pipeline stages: the
/// catalog enumerator turns nothing into a URL set, the flat extractor turns
/// that set into the JSON payload.
pub trait Collector {
    type Input;
    type Output;

    fn collect(&self, input: Self::Input) -> Self::Output;
}
