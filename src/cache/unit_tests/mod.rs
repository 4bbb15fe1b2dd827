#[cfg(test)]
mod coherence_tests;
