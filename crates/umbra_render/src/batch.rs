use crate::{draw_queue::DrawQueue, texture::Texture, vertex::Vertex};

/// Geometry for a single draw call plus the textures bound to its slots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    /// Slot `i` samples `textures[i]`; vertices address slots through `tex_index`
    pub textures: Vec<Texture>,
    pub vertices: Vec<Vertex>,
    /// Relative to the start of `vertices`
    pub indices: Vec<u32>,
}

impl Batch {
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn clear(&mut self) {
        self.textures.clear();
        self.vertices.clear();
        self.indices.clear();
    }
}

/// Splits a [`DrawQueue`] into draw calls with at most `max_slots` textures each
///
/// Quads keep their submission order. A texture already in the open batch reuses its
/// slot; a new one takes the next free slot, and when none is left the open batch is
/// submitted first. The accumulator is kept between flushes so its allocations are reused
#[derive(Debug, Default)]
pub struct Batcher {
    batch: Batch,
}

impl Batcher {
    /// Feeds every batch to `submit` & returns how many draw calls that took
    pub fn run(
        &mut self,
        queue: &DrawQueue,
        max_slots: usize,
        mut submit: impl FnMut(&Batch),
    ) -> usize {
        let max_slots = max_slots.max(1);
        let vertices = queue.vertices();
        let indices = queue.indices();
        let mut draws = 0;

        self.batch.clear();
        for (quad, texture) in queue.textures().iter().enumerate() {
            let slot = match self.batch.textures.iter().position(|t| t.id == texture.id) {
                Some(slot) => slot,
                None => {
                    if self.batch.textures.len() == max_slots {
                        submit(&self.batch);
                        draws += 1;
                        self.batch.clear();
                    }
                    self.batch.textures.push(*texture);
                    self.batch.textures.len() - 1
                }
            };

            let first_vertex = quad * 4;
            let base = self.batch.vertices.len() as u32;
            self.batch.vertices.extend(
                vertices[first_vertex..first_vertex + 4]
                    .iter()
                    .map(|v| Vertex {
                        tex_index: slot as f32,
                        ..*v
                    }),
            );
            self.batch.indices.extend(
                indices[quad * 6..quad * 6 + 6]
                    .iter()
                    .map(|i| i - first_vertex as u32 + base),
            );
        }

        if !self.batch.is_empty() {
            submit(&self.batch);
            draws += 1;
        }
        self.batch.clear();
        draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use glam::{Vec2, vec2};
    use proptest::prelude::*;
    use slotmap::KeyData;

    fn texture(n: u64) -> Texture {
        Texture {
            id: KeyData::from_ffi(n).into(),
            width: 1,
            height: 1,
        }
    }

    fn queue_of(textures: &[u64]) -> DrawQueue {
        let mut queue = DrawQueue::default();
        for (i, t) in textures.iter().enumerate() {
            let x = i as f32;
            queue.push_quad(
                [vec2(x, 0.0), vec2(x + 1.0, 0.0), vec2(x + 1.0, 1.0), vec2(x, 1.0)],
                [Vec2::ZERO; 4],
                [Color::WHITE; 4],
                texture(*t),
            );
        }
        queue
    }

    fn batches(queue: &DrawQueue, max_slots: usize) -> Vec<Batch> {
        let mut out = Vec::new();
        let draws = Batcher::default().run(queue, max_slots, |b| out.push(b.clone()));
        assert_eq!(draws, out.len());
        out
    }

    #[test]
    fn empty_queue_draws_nothing() {
        assert!(batches(&DrawQueue::default(), 16).is_empty());
    }

    #[test]
    fn seventeen_textures_need_two_draws() {
        let ids: Vec<u64> = (1..=17).collect();
        let out = batches(&queue_of(&ids), 16);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].textures.len(), 16);
        assert_eq!(out[0].quad_count(), 16);
        assert_eq!(out[1].textures, vec![texture(17)]);
    }

    #[test]
    fn sixteen_textures_fit_one_draw() {
        let ids: Vec<u64> = (1..=16).collect();
        assert_eq!(batches(&queue_of(&ids), 16).len(), 1);
    }

    #[test]
    fn repeated_textures_share_a_slot() {
        let out = batches(&queue_of(&[1, 2, 1, 1, 2]), 16);
        assert_eq!(out.len(), 1);
        let slots: Vec<f32> = out[0].vertices.iter().step_by(4).map(|v| v.tex_index).collect();
        assert_eq!(slots, vec![0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn indices_are_rebased_per_batch() {
        let out = batches(&queue_of(&[1, 2, 3]), 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].indices, vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
        assert_eq!(out[1].indices, vec![0, 1, 2, 0, 2, 3]);
        // the third quad's geometry moved along with it
        assert_eq!(out[1].vertices[0].position, [2.0, 0.0]);
        assert_eq!(out[1].vertices[0].tex_index, 0.0);
    }

    #[test]
    fn order_is_preserved_across_splits() {
        let out = batches(&queue_of(&[1, 2, 1]), 1);
        let xs: Vec<f32> = out.iter().map(|b| b.vertices[0].position[0]).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
    }

    proptest! {
        #[test]
        fn draw_count_is_bounded_by_distinct_textures(
            ids in prop::collection::vec(1u64..40, 1..200),
            max_slots in 1usize..20,
        ) {
            let queue = queue_of(&ids);
            let out = batches(&queue, max_slots);

            let mut distinct = ids.clone();
            distinct.sort_unstable();
            distinct.dedup();

            prop_assert!(out.len() >= distinct.len().div_ceil(max_slots));
            if distinct.len() <= max_slots {
                prop_assert_eq!(out.len(), 1);
            }
            prop_assert_eq!(out.iter().map(Batch::quad_count).sum::<usize>(), ids.len());
            for batch in &out {
                prop_assert!(batch.textures.len() <= max_slots);
                for v in &batch.vertices {
                    prop_assert!((v.tex_index as usize) < batch.textures.len());
                }
                for &i in &batch.indices {
                    prop_assert!((i as usize) < batch.vertices.len());
                }
            }
        }
    }
}
