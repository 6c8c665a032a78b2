// Random display names for anonymous collaborators.

use rand::seq::SliceRandom;
use rand::Rng;

pub const ANONYMOUS_PREFIX: &str = "Anonymous";

pub const ANIMALS: &[&str] = &[
    "Aardvark", "Albatross", "Alligator", "Alpaca", "Ant", "Anteater", "Antelope", "Armadillo",
    "Badger", "Bat", "Bear", "Beaver", "Bee", "Bison", "Buffalo", "Butterfly", "Camel",
    "Capybara", "Caribou", "Cat", "Chameleon", "Cheetah", "Chinchilla", "Cobra", "Coyote",
    "Crab", "Crane", "Crow", "Deer", "Dingo", "Dolphin", "Donkey", "Dove", "Dragonfly", "Duck",
    "Eagle", "Eel", "Elephant", "Elk", "Emu", "Falcon", "Ferret", "Finch", "Flamingo", "Fox",
    "Frog", "Gazelle", "Gecko", "Giraffe", "Goat", "Goose", "Gorilla", "Grasshopper", "Hamster",
    "Hare", "Hawk", "Hedgehog", "Heron", "Hippo", "Hummingbird", "Hyena", "Ibis", "Iguana",
    "Impala", "Jackal", "Jaguar", "Jellyfish", "Kangaroo", "Kingfisher", "Koala", "Kudu",
    "Lemur", "Leopard", "Lion", "Llama", "Lobster", "Lynx", "Magpie", "Manatee", "Meerkat",
    "Mink", "Mole", "Mongoose", "Moose", "Narwhal", "Newt", "Ocelot", "Octopus", "Okapi",
    "Opossum", "Orca", "Ostrich", "Otter", "Owl", "Panda", "Panther", "Parrot", "Peacock",
    "Pelican", "Penguin", "Platypus", "Porcupine", "Puffin", "Quail", "Quokka", "Rabbit",
    "Raccoon", "Raven", "Reindeer", "Salamander", "Seal", "Shark", "Sloth", "Squirrel",
    "Starling", "Stingray", "Swan", "Tapir", "Tiger", "Toucan", "Turtle", "Walrus", "Weasel",
    "Whale", "Wolf", "Wombat", "Yak", "Zebra",
];

/// `"Anonymous <Animal>"` with the animal picked from `rng`.
pub fn anonymous_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let animal = ANIMALS.choose(rng).copied().unwrap_or("Otter");
    format!("{ANONYMOUS_PREFIX} {animal}")
}

/// Convenience wrapper using the thread-local generator.
pub fn random_anonymous_name() -> String {
    anonymous_name(&mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn name_is_prefixed_animal() {
        let name = random_anonymous_name();
        let animal = name.strip_prefix("Anonymous ").expect("name should carry the prefix");
        assert!(ANIMALS.contains(&animal));
    }

    #[test]
    fn seeded_generator_is_reproducible() {
        let a = anonymous_name(&mut StdRng::seed_from_u64(7));
        let b = anonymous_name(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn animals_are_single_capitalized_words() {
        for animal in ANIMALS {
            assert!(!animal.contains(' '), "{animal} should be one word");
            assert!(animal.chars().next().is_some_and(|c| c.is_ascii_uppercase()));
        }
    }
}
