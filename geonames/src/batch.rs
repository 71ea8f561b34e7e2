//! Regroupement des enregistrements en lots de taille fixe

use std::num::NonZeroUsize;

use crate::types::GeonamesRecord;
use crate::GeonamesError;

/// Adaptateur qui regroupe un flux d'enregistrements en lots.
///
/// Un lot est émis dès qu'il atteint `size` enregistrements ; le dernier lot
/// partiel est émis à l'épuisement de la source. Sur erreur d'I/O, le lot en
/// cours est d'abord émis puis l'erreur.
pub struct Batches<I> {
    inner: I,
    size: NonZeroUsize,
    pending_error: Option<GeonamesError>,
    exhausted: bool,
}

impl<I> Batches<I>
where
    I: Iterator<Item = Result<GeonamesRecord, GeonamesError>>,
{
    pub fn new(inner: I, size: NonZeroUsize) -> Self {
        Self {
            inner,
            size,
            pending_error: None,
            exhausted: false,
        }
    }

    /// Récupère l'itérateur sous-jacent (pour lire ses statistiques)
    pub fn into_inner(self) -> I {
        self.inner
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }
}

impl<I> Iterator for Batches<I>
where
    I: Iterator<Item = Result<GeonamesRecord, GeonamesError>>,
{
    type Item = Result<Vec<GeonamesRecord>, GeonamesError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending_error.take() {
            return Some(Err(e));
        }
        if self.exhausted {
            return None;
        }

        let mut batch = Vec::with_capacity(self.size.get().min(16 * 1024));
        while batch.len() < self.size.get() {
            match self.inner.next() {
                Some(Ok(record)) => batch.push(record),
                Some(Err(e)) => {
                    self.exhausted = true;
                    if batch.is_empty() {
                        return Some(Err(e));
                    }
                    self.pending_error = Some(e);
                    break;
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}

/// Extension pour écrire `stream.batched(size)`
pub trait BatchExt: Iterator<Item = Result<GeonamesRecord, GeonamesError>> + Sized {
    fn batched(self, size: NonZeroUsize) -> Batches<Self> {
        Batches::new(self, size)
    }
}

impl<I> BatchExt for I where I: Iterator<Item = Result<GeonamesRecord, GeonamesError>> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> impl Iterator<Item = Result<GeonamesRecord, GeonamesError>> {
        (0..n).map(|i| {
            Ok(GeonamesRecord {
                id: i.to_string(),
                name: format!("P{}", i),
                latitude: 0.0,
                longitude: 0.0,
            })
        })
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_25000_records_make_three_batches() {
        let sizes: Vec<usize> = records(25_000)
            .batched(size(10_000))
            .map(|b| b.unwrap().len())
            .collect();
        assert_eq!(sizes, vec![10_000, 10_000, 5_000]);
    }

    #[test]
    fn test_batches_keep_source_order() {
        let batches: Vec<_> = records(5)
            .batched(size(2))
            .collect::<Result<_, _>>()
            .unwrap();
        let ids: Vec<_> = batches.iter().flatten().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        assert_eq!(records(20).batched(size(10)).count(), 2);
        assert_eq!(records(0).batched(size(10)).count(), 0);
    }

    #[test]
    fn test_partial_batch_flushed_before_error() {
        let source = records(3).chain(std::iter::once(Err(GeonamesError::Io(
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        ))));
        let mut batches = source.batched(size(10));

        assert_eq!(batches.next().unwrap().unwrap().len(), 3);
        assert!(matches!(batches.next(), Some(Err(GeonamesError::Io(_)))));
        assert!(batches.next().is_none());
    }
}
