//! Scene graph fragments produced by the decode pipeline.
//!
//! A [`SceneFragment`] is everything one asset contributes to a scene: the node
//! hierarchy plus the models, materials, textures and animation clips the nodes
//! refer to by index. Fragments are plain CPU data; uploading them is up to the
//! renderer that receives them.

use crate::data_structures::{
    animation::AnimationClip,
    instance::Instance,
    mesh::{Material, Model},
    texture::Texture,
};

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    /// glTF node index, the key animation clips refer to.
    pub index: usize,
    pub name: Option<String>,
    pub local: Instance,
    /// Index into [`SceneFragment::models`].
    pub model: Option<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(index: usize, local: Instance) -> Self {
        Self {
            index,
            name: None,
            local,
            model: None,
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Depth-first walk handing out every node with its world transform.
    pub fn visit<F>(&self, parent: &Instance, f: &mut F)
    where
        F: FnMut(&SceneNode, &Instance),
    {
        let world = parent * &self.local;
        f(self, &world);
        for child in &self.children {
            child.visit(&world, f);
        }
    }

    pub fn find(&self, index: usize) -> Option<&SceneNode> {
        if self.index == index {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(index))
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneFragment {
    pub roots: Vec<SceneNode>,
    pub models: Vec<Model>,
    pub materials: Vec<Material>,
    /// Indexed like the glTF `images` array.
    pub textures: Vec<Texture>,
    pub animations: Vec<AnimationClip>,
}

impl SceneFragment {
    pub fn visit<F>(&self, mut f: F)
    where
        F: FnMut(&SceneNode, &Instance),
    {
        let identity = Instance::new();
        for root in &self.roots {
            root.visit(&identity, &mut f);
        }
    }

    pub fn find_node(&self, index: usize) -> Option<&SceneNode> {
        self.roots.iter().find_map(|root| root.find(index))
    }

    pub fn node_count(&self) -> usize {
        self.roots.iter().map(SceneNode::node_count).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.models.iter().map(Model::vertex_count).sum()
    }

    pub fn animations_for(&self, node: usize) -> impl Iterator<Item = &AnimationClip> {
        self.animations.iter().filter(move |clip| clip.node == node)
    }
}

/// The outcome of a successful load, handed to the caller by value.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAsset {
    pub id: String,
    pub fragment: SceneFragment,
    /// Container bytes plus every external buffer and image fetched for it.
    pub byte_length: u64,
}
